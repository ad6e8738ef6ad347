// src/db/quota_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::AppError;
use crate::db::store::QuotaStore;
use crate::models::quota::{QuotaScope, QuotaStatus, UsageQuota};

// Quotas de uso: partição da plataforma, sempre filtradas pelo tenant.
#[derive(Clone)]
pub struct QuotaRepository {
    pool: PgPool,
}

impl QuotaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaStore for QuotaRepository {
    async fn find_for_scope(
        &self,
        tenant_id: &str,
        scope_type: QuotaScope,
        scope_id: &str,
        feature_key: &str,
    ) -> Result<Option<UsageQuota>, AppError> {
        let quota = sqlx::query_as::<_, UsageQuota>(
            r#"
            SELECT * FROM usage_quotas
            WHERE tenant_id = $1 AND scope_type = $2 AND scope_id = $3 AND feature_key = $4
            "#,
        )
        .bind(tenant_id)
        .bind(scope_type)
        .bind(scope_id)
        .bind(feature_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(quota)
    }

    async fn get(&self, id: Uuid) -> Result<Option<UsageQuota>, AppError> {
        let quota = sqlx::query_as::<_, UsageQuota>("SELECT * FROM usage_quotas WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(quota)
    }

    async fn try_consume(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<UsageQuota>, AppError> {
        // UM update condicional: incrementa somente se ainda há saldo e a
        // vigência está aberta. Isso é atômico e previne "race conditions":
        // N chamadas concorrentes no último saldo casam no máximo uma.
        let quota = sqlx::query_as::<_, UsageQuota>(
            r#"
            UPDATE usage_quotas
            SET used_count = used_count + 1, updated_at = $2
            WHERE id = $1
              AND status = $3
              AND (starts_at IS NULL OR starts_at <= $2)
              AND (ends_at IS NULL OR ends_at > $2)
              AND (limit_count IS NULL OR used_count < limit_count)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(QuotaStatus::Active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(quota)
    }

    async fn upsert(&self, quota: &UsageQuota) -> Result<UsageQuota, AppError> {
        // Recriar a quota de uma chave existente ajusta limite/vigência mas
        // PRESERVA o consumo já contado.
        let saved = sqlx::query_as::<_, UsageQuota>(
            r#"
            INSERT INTO usage_quotas
                (id, tenant_id, scope_type, scope_id, feature_key,
                 limit_count, used_count, status, starts_at, ends_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            ON CONFLICT (tenant_id, scope_type, scope_id, feature_key)
            DO UPDATE SET
                limit_count = EXCLUDED.limit_count,
                status = EXCLUDED.status,
                starts_at = EXCLUDED.starts_at,
                ends_at = EXCLUDED.ends_at,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(quota.id)
        .bind(&quota.tenant_id)
        .bind(quota.scope_type)
        .bind(&quota.scope_id)
        .bind(&quota.feature_key)
        .bind(quota.limit_count)
        .bind(quota.used_count)
        .bind(quota.status)
        .bind(quota.starts_at)
        .bind(quota.ends_at)
        .bind(quota.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn update_enforcement(
        &self,
        id: Uuid,
        limit: Option<i32>,
        ends_at: Option<DateTime<Utc>>,
        status: QuotaStatus,
    ) -> Result<Option<UsageQuota>, AppError> {
        let quota = sqlx::query_as::<_, UsageQuota>(
            r#"
            UPDATE usage_quotas
            SET limit_count = $2,
                ends_at = $3,
                status = $4,
                locked_at = CASE WHEN $4 = 'locked'::quota_status THEN COALESCE(locked_at, $5) ELSE NULL END,
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(limit)
        .bind(ends_at)
        .bind(status)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(quota)
    }

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<UsageQuota>, AppError> {
        let quotas = sqlx::query_as::<_, UsageQuota>(
            "SELECT * FROM usage_quotas WHERE tenant_id = $1 ORDER BY feature_key ASC, scope_type ASC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(quotas)
    }
}
