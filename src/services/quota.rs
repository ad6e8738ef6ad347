// src/services/quota.rs

// Admissão por quota. A quota de USUÁRIO, quando fiscalizável, sombreia a de
// GRUPO por completo; sem quota aplicável a chamada passa sem contar
// (decisão de produto: ausência de quota = sem restrição). Gastar uma
// unidade é um único update condicional no store, nunca ler-e-incrementar.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::QuotaStore,
    models::quota::{
        Admission, CreateQuotaPayload, QuotaScope, QuotaStatus, UpdateQuotaPayload, UsageQuota,
    },
};

#[derive(Clone)]
pub struct QuotaService {
    quotas: Arc<dyn QuotaStore>,
}

impl QuotaService {
    pub fn new(quotas: Arc<dyn QuotaStore>) -> Self {
        Self { quotas }
    }

    // Admite (e conta) uma chamada da feature para o usuário no tenant.
    // `used == limit` já nega: a última unidade é a que atinge o limite.
    pub async fn admit(
        &self,
        tenant_id: &str,
        user_id: Uuid,
        group_id: Option<&str>,
        feature_key: &str,
    ) -> Result<Admission, AppError> {
        let now = Utc::now();

        // Quota do usuário primeiro; fiscalizável, ela decide sozinha e a de
        // grupo nem é consultada
        let user_scope = user_id.to_string();
        if let Some(quota) = self
            .quotas
            .find_for_scope(tenant_id, QuotaScope::User, &user_scope, feature_key)
            .await?
        {
            if quota.is_enforceable(now) {
                return self.consume(quota, feature_key, now).await;
            }
        }

        // Travada ou vencida não sombreia: cai para o grupo
        if let Some(group) = group_id {
            if let Some(quota) = self
                .quotas
                .find_for_scope(tenant_id, QuotaScope::Group, group, feature_key)
                .await?
            {
                if quota.is_enforceable(now) {
                    return self.consume(quota, feature_key, now).await;
                }
            }
        }

        Ok(Admission::Unrestricted)
    }

    async fn consume(
        &self,
        quota: UsageQuota,
        feature_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Admission, AppError> {
        match self.quotas.try_consume(quota.id, now).await? {
            Some(updated) => Ok(Admission::Admitted {
                quota_id: updated.id,
                scope_type: updated.scope_type,
                remaining: updated.available(),
            }),
            None => {
                // Negado. Relê para reportar números frescos; a linha pode ter
                // mudado entre a seleção e o update condicional.
                let fresh = self.quotas.get(quota.id).await?.unwrap_or(quota);
                tracing::warn!(
                    "📉 Quota excedida: {} {}/{} em '{}'",
                    feature_key,
                    fresh.used_count,
                    fresh
                        .limit_count
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| "∞".to_string()),
                    fresh.tenant_id
                );
                Err(AppError::QuotaExceeded {
                    feature_key: feature_key.to_string(),
                    limit: fresh.limit_count,
                    used: fresh.used_count,
                    available: fresh.available().unwrap_or(0),
                    scope_type: fresh.scope_type,
                })
            }
        }
    }

    pub async fn create(&self, payload: CreateQuotaPayload) -> Result<UsageQuota, AppError> {
        // Sem limite e sem término não resta nada para fiscalizar
        if payload.limit.is_none() && payload.ends_at.is_none() {
            return Err(AppError::validation(
                "limit",
                "unenforceable_quota",
                "Informe um limite ou uma data de término.",
            ));
        }

        let now = Utc::now();
        let quota = UsageQuota {
            id: Uuid::new_v4(),
            tenant_id: payload.tenant_id.clone(),
            scope_type: payload.scope_type,
            scope_id: payload.scope_id.clone(),
            feature_key: payload.feature_key.clone(),
            limit_count: payload.limit,
            used_count: 0,
            status: QuotaStatus::Active,
            starts_at: payload.starts_at.or(Some(now)),
            ends_at: payload.ends_at,
            locked_at: None,
            created_at: now,
            updated_at: now,
        };

        // Se a chave (tenant, escopo, feature) já existir, o upsert preserva
        // o consumo contado
        let saved = self.quotas.upsert(&quota).await?;
        tracing::info!(
            "📊 Quota de '{}' para {:?}:{} em '{}' (limite {:?})",
            saved.feature_key,
            saved.scope_type,
            saved.scope_id,
            saved.tenant_id,
            saved.limit_count
        );
        Ok(saved)
    }

    // Substituição, não merge: campo ausente no payload é removido da quota
    pub async fn update(
        &self,
        id: Uuid,
        payload: UpdateQuotaPayload,
    ) -> Result<UsageQuota, AppError> {
        let current = self
            .quotas
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quota não encontrada.".to_string()))?;

        if payload.limit.is_none() && payload.ends_at.is_none() {
            return Err(AppError::validation(
                "limit",
                "unenforceable_quota",
                "A atualização deixaria a quota sem limite e sem término.",
            ));
        }

        let status = payload.status.unwrap_or(current.status);
        let updated = self
            .quotas
            .update_enforcement(id, payload.limit, payload.ends_at, status)
            .await?
            .ok_or_else(|| AppError::NotFound("Quota não encontrada.".to_string()))?;
        Ok(updated)
    }

    pub async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<UsageQuota>, AppError> {
        self.quotas.list_for_tenant(tenant_id).await
    }
}
