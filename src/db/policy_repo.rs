// src/db/policy_repo.rs

use async_trait::async_trait;

use crate::common::AppError;
use crate::db::router::{TenantDbRouter, scoped_table};
use crate::db::store::PolicyDocumentStore;
use crate::models::policy::PolicyDocument;
use crate::models::tenancy::PlatformKey;

// Documentos de política: partição do TENANT, tabela com prefixo do módulo
// (`policy_documents`). O carimbo de tenant é redundante com a partição, de
// propósito: escrita sempre carimba, leitura sempre filtra.
#[derive(Clone)]
pub struct PolicyDocumentRepository {
    router: TenantDbRouter,
}

impl PolicyDocumentRepository {
    pub fn new(router: TenantDbRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl PolicyDocumentStore for PolicyDocumentRepository {
    async fn insert(&self, document: &PolicyDocument) -> Result<(), AppError> {
        let pool = self.router.tenant_partition(&document.tenant_id).await?;
        let table = scoped_table(PlatformKey::Policy, "documents");

        let sql = format!(
            r#"
            INSERT INTO {table}
                (id, tenant_id, title, category, content, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#
        );
        sqlx::query(&sql)
            .bind(document.id)
            .bind(&document.tenant_id)
            .bind(&document.title)
            .bind(&document.category)
            .bind(&document.content)
            .bind(document.created_by)
            .bind(document.created_at)
            .bind(document.updated_at)
            .execute(&pool)
            .await?;
        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<PolicyDocument>, AppError> {
        let pool = self.router.tenant_partition(tenant_id).await?;
        let table = scoped_table(PlatformKey::Policy, "documents");

        let sql = format!("SELECT * FROM {table} WHERE tenant_id = $1 ORDER BY created_at DESC");
        let documents = sqlx::query_as::<_, PolicyDocument>(&sql)
            .bind(tenant_id)
            .fetch_all(&pool)
            .await?;
        Ok(documents)
    }
}
