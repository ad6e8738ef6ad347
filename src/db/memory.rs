// src/db/memory.rs

// Implementações em memória dos stores, com a MESMA semântica observável
// das versões Postgres (inclusive a atomicidade da admissão de quota e da
// reivindicação de idempotência, garantida aqui pelo lock). Servem aos
// testes de integração e a servidores efêmeros de desenvolvimento.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::common::AppError;
use crate::db::store::{
    AuditStore, ClaimOutcome, IdempotencyStore, PolicyDocumentStore, QuotaStore,
    RefreshTokenStore, SessionStore, TenantStore, UserStore,
};
use crate::models::audit::AuditLogEntry;
use crate::models::auth::{RefreshCredential, Session, User};
use crate::models::idempotency::{IdempotencyKey, IdempotencyRecord};
use crate::models::policy::PolicyDocument;
use crate::models::quota::{QuotaScope, QuotaStatus, UsageQuota};
use crate::models::tenancy::{Entitlements, SubscriptionContract, Tenant};

// ---
// 1. Usuários
// ---
#[derive(Default)]
pub struct MemUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, user: User) {
        self.users.lock().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserStore for MemUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        if let Some(user) = self.users.lock().await.get_mut(&id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }
}

// ---
// 2. Sessões
// ---
#[derive(Default)]
pub struct MemSessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemSessionStore {
    async fn insert(&self, session: &Session) -> Result<(), AppError> {
        self.sessions.lock().await.insert(session.id, session.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        Ok(self.sessions.lock().await.get(&id).cloned())
    }

    async fn find_for_user(&self, user_id: Uuid) -> Result<Option<Session>, AppError> {
        let sessions = self.sessions.lock().await;
        let mut found: Option<Session> = None;
        for session in sessions.values() {
            if session.user_id == user_id {
                let newer = match &found {
                    Some(current) => session.issued_at > current.issued_at,
                    None => true,
                };
                if newer {
                    found = Some(session.clone());
                }
            }
        }
        Ok(found)
    }

    async fn set_active_tenant(&self, id: Uuid, tenant_id: &str) -> Result<Option<Session>, AppError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&id) {
            Some(session) => {
                session.active_tenant_id = tenant_id.to_string();
                Ok(Some(session.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.sessions.lock().await.remove(&id);
        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

// ---
// 3. Credenciais de renovação
// ---
#[derive(Default)]
pub struct MemRefreshTokenStore {
    credentials: Mutex<HashMap<Uuid, RefreshCredential>>,
}

impl MemRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for MemRefreshTokenStore {
    async fn insert(&self, credential: &RefreshCredential) -> Result<(), AppError> {
        self.credentials
            .lock()
            .await
            .insert(credential.id, credential.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshCredential>, AppError> {
        let credentials = self.credentials.lock().await;
        Ok(credentials.values().find(|c| c.token_hash == token_hash).cloned())
    }

    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(credential) = self.credentials.lock().await.get_mut(&id) {
            credential.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn revoke(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(credential) = self.credentials.lock().await.get_mut(&id) {
            credential.revoked = true;
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut credentials = self.credentials.lock().await;
        let mut revoked = 0;
        for credential in credentials.values_mut() {
            if credential.user_id == user_id && !credential.revoked {
                credential.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.credentials.lock().await.remove(&id);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut credentials = self.credentials.lock().await;
        let before = credentials.len();
        credentials.retain(|_, c| c.expires_at > now);
        Ok((before - credentials.len()) as u64)
    }
}

// ---
// 4. Diretório de tenants
// ---
#[derive(Default)]
pub struct MemTenantStore {
    tenants: Mutex<HashMap<String, Tenant>>,
    contracts: Mutex<Vec<SubscriptionContract>>,
    members: Mutex<Vec<(Uuid, String)>>,
}

impl MemTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Os testes usam isto para bloquear um tenant no meio de uma sessão viva
    pub async fn set_status(&self, tenant_id: &str, status: crate::models::tenancy::TenantStatus) {
        if let Some(tenant) = self.tenants.lock().await.get_mut(tenant_id) {
            tenant.status = status;
            tenant.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl TenantStore for MemTenantStore {
    async fn find(&self, tenant_id: &str) -> Result<Option<Tenant>, AppError> {
        Ok(self.tenants.lock().await.get(tenant_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Tenant>, AppError> {
        let mut tenants: Vec<Tenant> = self.tenants.lock().await.values().cloned().collect();
        tenants.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tenants)
    }

    async fn insert(&self, tenant: &Tenant) -> Result<(), AppError> {
        let mut tenants = self.tenants.lock().await;
        if tenants.contains_key(&tenant.tenant_id) {
            return Err(AppError::Conflict(format!(
                "O tenant '{}' já existe.",
                tenant.tenant_id
            )));
        }
        tenants.insert(tenant.tenant_id.clone(), tenant.clone());
        Ok(())
    }

    async fn update_entitlements(
        &self,
        tenant_id: &str,
        entitlements: Entitlements,
    ) -> Result<Option<Tenant>, AppError> {
        let mut tenants = self.tenants.lock().await;
        match tenants.get_mut(tenant_id) {
            Some(tenant) => {
                tenant.entitlements = entitlements;
                tenant.updated_at = Utc::now();
                Ok(Some(tenant.clone()))
            }
            None => Ok(None),
        }
    }

    async fn insert_contract(&self, contract: &SubscriptionContract) -> Result<(), AppError> {
        self.contracts.lock().await.push(contract.clone());
        Ok(())
    }

    async fn is_member(&self, user_id: Uuid, tenant_id: &str) -> Result<bool, AppError> {
        let members = self.members.lock().await;
        Ok(members.iter().any(|(u, t)| *u == user_id && t == tenant_id))
    }

    async fn add_member(&self, user_id: Uuid, tenant_id: &str) -> Result<(), AppError> {
        let mut members = self.members.lock().await;
        if !members.iter().any(|(u, t)| *u == user_id && t == tenant_id) {
            members.push((user_id, tenant_id.to_string()));
        }
        Ok(())
    }
}

// ---
// 5. Quotas
// ---
#[derive(Default)]
pub struct MemQuotaStore {
    quotas: Mutex<HashMap<Uuid, UsageQuota>>,
}

impl MemQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for MemQuotaStore {
    async fn find_for_scope(
        &self,
        tenant_id: &str,
        scope_type: QuotaScope,
        scope_id: &str,
        feature_key: &str,
    ) -> Result<Option<UsageQuota>, AppError> {
        let quotas = self.quotas.lock().await;
        Ok(quotas
            .values()
            .find(|q| {
                q.tenant_id == tenant_id
                    && q.scope_type == scope_type
                    && q.scope_id == scope_id
                    && q.feature_key == feature_key
            })
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<UsageQuota>, AppError> {
        Ok(self.quotas.lock().await.get(&id).cloned())
    }

    async fn try_consume(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<UsageQuota>, AppError> {
        // Mesmas condições do UPDATE condicional do Postgres; o lock faz o
        // papel da atomicidade do banco
        let mut quotas = self.quotas.lock().await;
        let Some(quota) = quotas.get_mut(&id) else {
            return Ok(None);
        };

        if quota.status != QuotaStatus::Active {
            return Ok(None);
        }
        if quota.starts_at.is_some_and(|starts| starts > now) {
            return Ok(None);
        }
        if quota.ends_at.is_some_and(|ends| ends <= now) {
            return Ok(None);
        }
        if quota.limit_count.is_some_and(|limit| quota.used_count >= limit) {
            return Ok(None);
        }

        quota.used_count += 1;
        quota.updated_at = now;
        Ok(Some(quota.clone()))
    }

    async fn upsert(&self, quota: &UsageQuota) -> Result<UsageQuota, AppError> {
        let mut quotas = self.quotas.lock().await;
        let existing_id = quotas
            .values()
            .find(|q| {
                q.tenant_id == quota.tenant_id
                    && q.scope_type == quota.scope_type
                    && q.scope_id == quota.scope_id
                    && q.feature_key == quota.feature_key
            })
            .map(|q| q.id);

        match existing_id {
            Some(id) => {
                // Preserva o consumo já contado, como no ON CONFLICT
                let current = quotas.get_mut(&id).ok_or_else(|| {
                    AppError::InternalServerError(anyhow::anyhow!("quota sumiu do índice"))
                })?;
                current.limit_count = quota.limit_count;
                current.status = quota.status;
                current.starts_at = quota.starts_at;
                current.ends_at = quota.ends_at;
                current.updated_at = quota.updated_at;
                Ok(current.clone())
            }
            None => {
                quotas.insert(quota.id, quota.clone());
                Ok(quota.clone())
            }
        }
    }

    async fn update_enforcement(
        &self,
        id: Uuid,
        limit: Option<i32>,
        ends_at: Option<DateTime<Utc>>,
        status: QuotaStatus,
    ) -> Result<Option<UsageQuota>, AppError> {
        let mut quotas = self.quotas.lock().await;
        match quotas.get_mut(&id) {
            Some(quota) => {
                let now = Utc::now();
                quota.limit_count = limit;
                quota.ends_at = ends_at;
                quota.status = status;
                quota.locked_at = match status {
                    QuotaStatus::Locked => quota.locked_at.or(Some(now)),
                    QuotaStatus::Active => None,
                };
                quota.updated_at = now;
                Ok(Some(quota.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<UsageQuota>, AppError> {
        let quotas = self.quotas.lock().await;
        let mut result: Vec<UsageQuota> = quotas
            .values()
            .filter(|q| q.tenant_id == tenant_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.feature_key.cmp(&b.feature_key));
        Ok(result)
    }
}

// ---
// 6. Idempotência
// ---
#[derive(Default)]
pub struct MemIdempotencyStore {
    records: Mutex<HashMap<IdempotencyKey, IdempotencyRecord>>,
}

impl MemIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for MemIdempotencyStore {
    async fn claim(&self, key: &IdempotencyKey, now: DateTime<Utc>) -> Result<ClaimOutcome, AppError> {
        let mut records = self.records.lock().await;
        if let Some(existing) = records.get(key) {
            return Ok(ClaimOutcome::Existing(existing.clone()));
        }
        records.insert(
            key.clone(),
            IdempotencyRecord {
                tenant_id: key.tenant_id.clone(),
                method: key.method.clone(),
                pathname: key.pathname.clone(),
                client_request_id: key.client_request_id.clone(),
                response_status: None,
                response_body: None,
                created_at: now,
                completed_at: None,
            },
        );
        Ok(ClaimOutcome::Claimed)
    }

    async fn complete(
        &self,
        key: &IdempotencyKey,
        status: i32,
        body: serde_json::Value,
    ) -> Result<(), AppError> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(key) {
            if record.response_status.is_none() {
                record.response_status = Some(status);
                record.response_body = Some(body);
                record.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<(), AppError> {
        let mut records = self.records.lock().await;
        if records.get(key).is_some_and(|r| r.response_status.is_none()) {
            records.remove(key);
        }
        Ok(())
    }

    async fn find(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>, AppError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| r.created_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

// ---
// 7. Auditoria
// ---
#[derive(Default)]
pub struct MemAuditStore {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl MemAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditStore for MemAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AppError> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &str,
        include_untagged: bool,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        let entries = self.entries.lock().await;
        let mut result: Vec<AuditLogEntry> = entries
            .iter()
            .filter(|e| match &e.tenant_id {
                Some(tag) if !tag.is_empty() => tag == tenant_id,
                // Sem carimbo: só entra no modo de compatibilidade
                _ => include_untagged,
            })
            .cloned()
            .collect();
        result.reverse();
        result.truncate(limit as usize);
        Ok(result)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.timestamp >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

// ---
// 8. Documentos de política
// ---
#[derive(Default)]
pub struct MemPolicyDocumentStore {
    documents: Mutex<Vec<PolicyDocument>>,
}

impl MemPolicyDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyDocumentStore for MemPolicyDocumentStore {
    async fn insert(&self, document: &PolicyDocument) -> Result<(), AppError> {
        self.documents.lock().await.push(document.clone());
        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<PolicyDocument>, AppError> {
        let documents = self.documents.lock().await;
        let mut result: Vec<PolicyDocument> = documents
            .iter()
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

// ---
// 9. Provisionador vazio
// ---

// Em memória não existe partição física para criar
pub struct NoopProvisioner;

#[async_trait]
impl crate::db::router::PartitionProvisioner for NoopProvisioner {
    async fn provision(&self, _db_name: &str) -> Result<(), AppError> {
        Ok(())
    }
}
