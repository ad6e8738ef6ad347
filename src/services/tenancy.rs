// src/services/tenancy.rs

// Provisionamento e resolução de tenants. A resolução falha FECHADA:
// tenant desconhecido ou arquivado é 404, bloqueado é 403. Não existe
// fallback para consulta sem escopo em nenhum caminho.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::router::{PartitionProvisioner, partition_name_for},
    db::store::{QuotaStore, TenantStore},
    models::quota::{QuotaScope, QuotaStatus, UsageQuota},
    models::tenancy::{
        ContractStatus, Entitlements, PLATFORM_TENANT, ProvisionTenantPayload,
        SubscriptionContract, Tenant, TenantStatus,
    },
};

// Grupo semeado quando o contrato traz um teto de IA no provisionamento
const DEFAULT_GROUP: &str = "default";
const AI_FEATURE_KEY: &str = "ai.assist";

#[derive(Clone)]
pub struct TenancyService {
    tenants: Arc<dyn TenantStore>,
    quotas: Arc<dyn QuotaStore>,
    provisioner: Arc<dyn PartitionProvisioner>,
}

impl TenancyService {
    pub fn new(
        tenants: Arc<dyn TenantStore>,
        quotas: Arc<dyn QuotaStore>,
        provisioner: Arc<dyn PartitionProvisioner>,
    ) -> Self {
        Self {
            tenants,
            quotas,
            provisioner,
        }
    }

    // Resolve o tenant ativo da sessão. O guard chama isto a cada request,
    // então um bloqueio administrativo vale imediatamente.
    pub async fn resolve(&self, tenant_id: &str) -> Result<Tenant, AppError> {
        let tenant = self
            .tenants
            .find(tenant_id)
            .await?
            .ok_or_else(AppError::tenant_not_found)?;

        match tenant.status {
            TenantStatus::Active => Ok(tenant),
            TenantStatus::Blocked => Err(AppError::tenant_blocked()),
            TenantStatus::Archived => Err(AppError::tenant_not_found()),
        }
    }

    pub async fn provision(&self, payload: ProvisionTenantPayload) -> Result<Tenant, AppError> {
        let tenant_id = payload.tenant_id.trim().to_lowercase();
        validate_tenant_key(&tenant_id)?;

        let now = Utc::now();
        let entitlements = payload.entitlements.unwrap_or_default();

        let tenant = Tenant {
            tenant_id: tenant_id.clone(),
            name: payload.name.clone(),
            db_name: partition_name_for(&tenant_id),
            entitlements,
            max_users: payload.max_users,
            status: TenantStatus::Active,
            subscription_ends_at: None,
            created_at: now,
            updated_at: now,
        };

        // Diretório primeiro: o unique de tenant_id arbitra provisionamento
        // duplicado antes de qualquer DDL
        self.tenants.insert(&tenant).await?;
        self.provisioner.provision(&tenant.db_name).await?;

        let contract = SubscriptionContract {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.clone(),
            enabled_platforms: entitlements,
            ai_quota: payload.ai_quota,
            max_users: payload.max_users,
            status: ContractStatus::Active,
            starts_at: now,
            ends_at: None,
            created_at: now,
        };
        self.tenants.insert_contract(&contract).await?;

        // O teto de IA do contrato já nasce como quota de grupo fiscalizável
        if let Some(limit) = payload.ai_quota {
            let quota = UsageQuota {
                id: Uuid::new_v4(),
                tenant_id: tenant_id.clone(),
                scope_type: QuotaScope::Group,
                scope_id: DEFAULT_GROUP.to_string(),
                feature_key: AI_FEATURE_KEY.to_string(),
                limit_count: Some(limit),
                used_count: 0,
                status: QuotaStatus::Active,
                starts_at: Some(now),
                ends_at: None,
                locked_at: None,
                created_at: now,
                updated_at: now,
            };
            self.quotas.upsert(&quota).await?;
        }

        tracing::info!(
            "🏥 Tenant '{}' provisionado (partição {})",
            tenant_id,
            tenant.db_name
        );
        Ok(tenant)
    }

    pub async fn update_entitlements(
        &self,
        tenant_id: &str,
        entitlements: Entitlements,
    ) -> Result<Tenant, AppError> {
        let updated = self
            .tenants
            .update_entitlements(tenant_id, entitlements)
            .await?
            .ok_or_else(AppError::tenant_not_found)?;

        tracing::info!("📦 Entitlements de '{}' atualizados", tenant_id);
        Ok(updated)
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, AppError> {
        self.tenants.list().await
    }

    pub async fn add_member(&self, user_id: Uuid, tenant_id: &str) -> Result<(), AppError> {
        self.tenants.add_member(user_id, tenant_id).await
    }
}

// A chave do tenant entra em cookie, URL e auditoria: alfabeto estreito,
// nunca o sentinela reservado do console
fn validate_tenant_key(tenant_id: &str) -> Result<(), AppError> {
    let shape_ok = tenant_id.len() >= 2
        && tenant_id.len() <= 40
        && tenant_id
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && tenant_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if !shape_ok {
        return Err(AppError::validation(
            "tenantId",
            "invalid_tenant_key",
            "Use minúsculas, dígitos e hífen (2 a 40 caracteres).",
        ));
    }

    if tenant_id == PLATFORM_TENANT {
        return Err(AppError::validation(
            "tenantId",
            "reserved_tenant_key",
            "'platform' é reservado para o console.",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chave_de_tenant_aceita_o_alfabeto_estreito() {
        assert!(validate_tenant_key("hospital-sul").is_ok());
        assert!(validate_tenant_key("a2").is_ok());
    }

    #[test]
    fn chave_de_tenant_recusa_sentinela_e_caracteres_fora() {
        assert!(validate_tenant_key("platform").is_err());
        assert!(validate_tenant_key("Hospital").is_err());
        assert!(validate_tenant_key("a").is_err());
        assert!(validate_tenant_key("acme hospital").is_err());
        assert!(validate_tenant_key("acme;drop").is_err());
    }
}
