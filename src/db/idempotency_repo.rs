// src/db/idempotency_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::common::AppError;
use crate::db::router::TenantDbRouter;
use crate::db::store::{ClaimOutcome, IdempotencyStore};
use crate::models::idempotency::{IdempotencyKey, IdempotencyRecord};

// Registros de idempotência vivem na partição do tenant dono da requisição;
// o roteador resolve a chave até o pool certo.
#[derive(Clone)]
pub struct IdempotencyRepository {
    router: TenantDbRouter,
}

impl IdempotencyRepository {
    pub fn new(router: TenantDbRouter) -> Self {
        Self { router }
    }

    async fn pool_for(&self, key: &IdempotencyKey) -> Result<PgPool, AppError> {
        self.router.tenant_partition(&key.tenant_id).await
    }
}

#[async_trait]
impl IdempotencyStore for IdempotencyRepository {
    async fn claim(&self, key: &IdempotencyKey, now: DateTime<Utc>) -> Result<ClaimOutcome, AppError> {
        let pool = self.pool_for(key).await?;

        // O índice único da chave arbitra a corrida: só um INSERT devolve
        // linha; os demais caem no DO NOTHING e leem o registro existente.
        // O laço cobre a janela rara em que o dono liberou a chave entre o
        // conflito e a leitura.
        for _ in 0..3 {
            let inserted = sqlx::query_as::<_, IdempotencyRecord>(
                r#"
                INSERT INTO idempotency_records
                    (tenant_id, method, pathname, client_request_id, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (tenant_id, method, pathname, client_request_id) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(&key.tenant_id)
            .bind(&key.method)
            .bind(&key.pathname)
            .bind(&key.client_request_id)
            .bind(now)
            .fetch_optional(&pool)
            .await?;

            if inserted.is_some() {
                return Ok(ClaimOutcome::Claimed);
            }

            if let Some(existing) = self.find(key).await? {
                return Ok(ClaimOutcome::Existing(existing));
            }
        }

        Err(AppError::Conflict(
            "Não foi possível reivindicar a chave de idempotência.".to_string(),
        ))
    }

    async fn complete(
        &self,
        key: &IdempotencyKey,
        status: i32,
        body: serde_json::Value,
    ) -> Result<(), AppError> {
        let pool = self.pool_for(key).await?;
        // O guarda `response_status IS NULL` garante escrita única
        sqlx::query(
            r#"
            UPDATE idempotency_records
            SET response_status = $5, response_body = $6, completed_at = now()
            WHERE tenant_id = $1 AND method = $2 AND pathname = $3 AND client_request_id = $4
              AND response_status IS NULL
            "#,
        )
        .bind(&key.tenant_id)
        .bind(&key.method)
        .bind(&key.pathname)
        .bind(&key.client_request_id)
        .bind(status)
        .bind(body)
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<(), AppError> {
        let pool = self.pool_for(key).await?;
        // Só remove marcadores ainda pendentes; desfechos gravados são imutáveis
        sqlx::query(
            r#"
            DELETE FROM idempotency_records
            WHERE tenant_id = $1 AND method = $2 AND pathname = $3 AND client_request_id = $4
              AND response_status IS NULL
            "#,
        )
        .bind(&key.tenant_id)
        .bind(&key.method)
        .bind(&key.pathname)
        .bind(&key.client_request_id)
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn find(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>, AppError> {
        let pool = self.pool_for(key).await?;
        let record = sqlx::query_as::<_, IdempotencyRecord>(
            r#"
            SELECT * FROM idempotency_records
            WHERE tenant_id = $1 AND method = $2 AND pathname = $3 AND client_request_id = $4
            "#,
        )
        .bind(&key.tenant_id)
        .bind(&key.method)
        .bind(&key.pathname)
        .bind(&key.client_request_id)
        .fetch_optional(&pool)
        .await?;
        Ok(record)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        // Percorre as partições conhecidas pelo diretório
        let tenants = sqlx::query_scalar::<_, String>(
            "SELECT tenant_id FROM tenants WHERE status = 'active'",
        )
        .fetch_all(self.router.platform())
        .await?;

        let mut purged = 0;
        for tenant_id in tenants {
            let pool = match self.router.tenant_partition(&tenant_id).await {
                Ok(pool) => pool,
                // Partição indisponível não derruba a varredura
                Err(e) => {
                    tracing::warn!("varredura de idempotência pulou '{}': {}", tenant_id, e);
                    continue;
                }
            };
            let result = sqlx::query("DELETE FROM idempotency_records WHERE created_at < $1")
                .bind(cutoff)
                .execute(&pool)
                .await?;
            purged += result.rows_affected();
        }
        Ok(purged)
    }
}
