// src/db/store.rs

// Contratos dos stores. Cada um tem duas implementações: Postgres (produção)
// e memória (testes e servidores efêmeros). As services só enxergam isto.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::common::AppError;
use crate::models::audit::AuditLogEntry;
use crate::models::auth::{RefreshCredential, Session, User};
use crate::models::idempotency::{IdempotencyKey, IdempotencyRecord};
use crate::models::policy::PolicyDocument;
use crate::models::quota::{QuotaScope, QuotaStatus, UsageQuota};
use crate::models::tenancy::{Entitlements, SubscriptionContract, Tenant};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<(), AppError>;
    async fn find(&self, id: Uuid) -> Result<Option<Session>, AppError>;

    // Sessão única por usuário torna esta busca não ambígua; a renovação de
    // refresh usa isto para reencontrar a sessão viva
    async fn find_for_user(&self, user_id: Uuid) -> Result<Option<Session>, AppError>;

    // Troca o tenant ativo; devolve a sessão atualizada
    async fn set_active_tenant(&self, id: Uuid, tenant_id: &str) -> Result<Option<Session>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    // Login impõe sessão única: derruba as anteriores do usuário
    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, credential: &RefreshCredential) -> Result<(), AppError>;

    // Busca pelo digest; o texto puro nunca chega ao store
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshCredential>, AppError>;

    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;
    async fn revoke(&self, id: Uuid) -> Result<(), AppError>;
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find(&self, tenant_id: &str) -> Result<Option<Tenant>, AppError>;
    async fn list(&self) -> Result<Vec<Tenant>, AppError>;

    // Falha com Conflict se o tenant_id já existir
    async fn insert(&self, tenant: &Tenant) -> Result<(), AppError>;

    async fn update_entitlements(
        &self,
        tenant_id: &str,
        entitlements: Entitlements,
    ) -> Result<Option<Tenant>, AppError>;

    async fn insert_contract(&self, contract: &SubscriptionContract) -> Result<(), AppError>;

    async fn is_member(&self, user_id: Uuid, tenant_id: &str) -> Result<bool, AppError>;
    async fn add_member(&self, user_id: Uuid, tenant_id: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait QuotaStore: Send + Sync {
    // Linha crua da chave; a validade de vigência é julgada pela service
    async fn find_for_scope(
        &self,
        tenant_id: &str,
        scope_type: QuotaScope,
        scope_id: &str,
        feature_key: &str,
    ) -> Result<Option<UsageQuota>, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<UsageQuota>, AppError>;

    // O coração da admissão: UM update condicional. Devolve a linha
    // atualizada quando a condição casou; None = negado. Ler `used` e
    // incrementar depois é proibido (corrida clássica).
    async fn try_consume(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<UsageQuota>, AppError>;

    async fn upsert(&self, quota: &UsageQuota) -> Result<UsageQuota, AppError>;

    // Atualização administrativa de limite/vigência/status
    async fn update_enforcement(
        &self,
        id: Uuid,
        limit: Option<i32>,
        ends_at: Option<DateTime<Utc>>,
        status: QuotaStatus,
    ) -> Result<Option<UsageQuota>, AppError>;

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<UsageQuota>, AppError>;
}

// Desfecho da tentativa de reivindicar uma chave de idempotência
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    // Inserimos o marcador pendente; o chamador executa o handler
    Claimed,
    // A chave já existia (pendente ou completa); nada foi executado
    Existing(IdempotencyRecord),
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    // Insere o marcador pendente de forma atômica; corrida é arbitrada pelo
    // índice único da chave
    async fn claim(&self, key: &IdempotencyKey, now: DateTime<Utc>) -> Result<ClaimOutcome, AppError>;

    // Completa o registro uma única vez com o desfecho do handler
    async fn complete(
        &self,
        key: &IdempotencyKey,
        status: i32,
        body: serde_json::Value,
    ) -> Result<(), AppError>;

    // Handler falhou: libera a chave para o cliente tentar de novo
    async fn release(&self, key: &IdempotencyKey) -> Result<(), AppError>;

    async fn find(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>, AppError>;

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AppError>;

    // `include_untagged` liga o filtro dual (tenant OU carimbo ausente) para
    // linhas anteriores ao particionamento
    async fn list_for_tenant(
        &self,
        tenant_id: &str,
        include_untagged: bool,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AppError>;

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait]
pub trait PolicyDocumentStore: Send + Sync {
    async fn insert(&self, document: &PolicyDocument) -> Result<(), AppError>;
    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<PolicyDocument>, AppError>;
}
