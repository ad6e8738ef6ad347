// src/models/tenancy.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Tenant sentinela do console da plataforma. Nunca vira partição física.
pub const PLATFORM_TENANT: &str = "platform";

// ---
// 1. PlatformKey (módulo de funcionalidade licenciável)
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKey {
    Policy,
    Clinical,
    Imaging,
    Training,
}

impl PlatformKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKey::Policy => "policy",
            PlatformKey::Clinical => "clinical",
            PlatformKey::Imaging => "imaging",
            PlatformKey::Training => "training",
        }
    }
}

// ---
// 2. Entitlements (flags de módulo compradas pelo tenant)
// ---
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Entitlements {
    pub policy: bool,
    pub clinical: bool,
    pub imaging: bool,
    pub training: bool,
}

impl Entitlements {
    pub fn enabled(&self, key: PlatformKey) -> bool {
        match key {
            PlatformKey::Policy => self.policy,
            PlatformKey::Clinical => self.clinical,
            PlatformKey::Imaging => self.imaging,
            PlatformKey::Training => self.training,
        }
    }
}

// ---
// 3. TenantStatus
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "tenant_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Blocked,
    Archived,
}

// ---
// 4. Tenant (registro no diretório da plataforma)
// ---
// `tenant_id` é a chave estável usada em cookies, quotas e auditoria;
// `db_name` aponta a partição física e não sai pela API.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub tenant_id: String,
    pub name: String,

    #[serde(skip_serializing)]
    pub db_name: String,

    #[sqlx(flatten)]
    pub entitlements: Entitlements,

    pub max_users: i32,
    pub status: TenantStatus,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// 5. SubscriptionContract (registro comercial por tenant)
// ---
// O contrato informa tetos padrão no provisionamento; a admissão em si
// consulta apenas UsageQuota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "contract_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Active,
    Expired,
    Canceled,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionContract {
    pub id: Uuid,
    pub tenant_id: String,

    #[sqlx(flatten)]
    pub enabled_platforms: Entitlements,

    pub ai_quota: Option<i32>,
    pub max_users: i32,
    pub status: ContractStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ---
// 6. UserTenant (ponte usuário-tenant)
// ---
// Quem pode fazer switch-tenant para onde.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserTenant {
    pub user_id: Uuid,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
}

// ---
// 7. Payloads do console
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionTenantPayload {
    #[validate(length(min = 2, max = 40, message = "Identificador de tenant inválido."))]
    pub tenant_id: String,
    #[validate(length(min = 2, max = 120, message = "O nome deve ter entre 2 e 120 caracteres."))]
    pub name: String,

    // Ausente = nenhum módulo habilitado
    pub entitlements: Option<Entitlements>,

    #[validate(range(min = 1, message = "maxUsers deve ser positivo."))]
    pub max_users: i32,

    // Teto padrão de quota do contrato; semeia uma quota de grupo se presente
    #[validate(range(min = 0, message = "aiQuota não pode ser negativa."))]
    pub ai_quota: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEntitlementsPayload {
    pub entitlements: Entitlements,
}
