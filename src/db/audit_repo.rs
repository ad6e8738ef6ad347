// src/db/audit_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::common::AppError;
use crate::db::router::tenant_read_filter;
use crate::db::store::AuditStore;
use crate::models::audit::AuditLogEntry;

// Trilha de auditoria: append-only, partição da plataforma. A tabela é
// anterior ao particionamento estrito, por isso a leitura aceita o filtro
// dual enquanto o backfill não termina. Escritas sempre carimbam o tenant.
#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for AuditRepository {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (id, actor_user_id, tenant_id, action, resource_type, resource_id,
                 success, error_message, ip, method, path, metadata, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor_user_id)
        .bind(&entry.tenant_id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(entry.success)
        .bind(&entry.error_message)
        .bind(&entry.ip)
        .bind(&entry.method)
        .bind(&entry.path)
        .bind(&entry.metadata)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &str,
        include_untagged: bool,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        let filter = tenant_read_filter("tenant_id", 1, include_untagged);
        let sql = format!("SELECT * FROM audit_logs WHERE {filter} ORDER BY timestamp DESC LIMIT $2");

        let entries = sqlx::query_as::<_, AuditLogEntry>(&sql)
            .bind(tenant_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM audit_logs WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
