// src/db/tenancy_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::AppError;
use crate::db::store::TenantStore;
use crate::models::tenancy::{Entitlements, SubscriptionContract, Tenant};

// Diretório de tenants e contratos: partição da plataforma.
#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStore for TenantRepository {
    async fn find(&self, tenant_id: &str) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn list(&self) -> Result<Vec<Tenant>, AppError> {
        let tenants = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(tenants)
    }

    async fn insert(&self, tenant: &Tenant) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO tenants
                (tenant_id, name, db_name, policy, clinical, imaging, training,
                 max_users, status, subscription_ends_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&tenant.tenant_id)
        .bind(&tenant.name)
        .bind(&tenant.db_name)
        .bind(tenant.entitlements.policy)
        .bind(tenant.entitlements.clinical)
        .bind(tenant.entitlements.imaging)
        .bind(tenant.entitlements.training)
        .bind(tenant.max_users)
        .bind(tenant.status)
        .bind(tenant.subscription_ends_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(format!(
                        "O tenant '{}' já existe.",
                        tenant.tenant_id
                    ));
                }
            }
            e.into()
        })?;
        Ok(())
    }

    async fn update_entitlements(
        &self,
        tenant_id: &str,
        entitlements: Entitlements,
    ) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            UPDATE tenants
            SET policy = $2, clinical = $3, imaging = $4, training = $5, updated_at = now()
            WHERE tenant_id = $1
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(entitlements.policy)
        .bind(entitlements.clinical)
        .bind(entitlements.imaging)
        .bind(entitlements.training)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn insert_contract(&self, contract: &SubscriptionContract) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO subscription_contracts
                (id, tenant_id, policy, clinical, imaging, training,
                 ai_quota, max_users, status, starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(contract.id)
        .bind(&contract.tenant_id)
        .bind(contract.enabled_platforms.policy)
        .bind(contract.enabled_platforms.clinical)
        .bind(contract.enabled_platforms.imaging)
        .bind(contract.enabled_platforms.training)
        .bind(contract.ai_quota)
        .bind(contract.max_users)
        .bind(contract.status)
        .bind(contract.starts_at)
        .bind(contract.ends_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_member(&self, user_id: Uuid, tenant_id: &str) -> Result<bool, AppError> {
        // SELECT EXISTS para a consulta mais rápida possível: só nos
        // interessa se a linha da ponte existe.
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_tenants
                WHERE user_id = $1 AND tenant_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn add_member(&self, user_id: Uuid, tenant_id: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_tenants (user_id, tenant_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, tenant_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
