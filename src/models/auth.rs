// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::tenancy::Entitlements;

// ---
// 1. Role (papel do usuário na plataforma)
// ---
// 'platform-owner' é papel de console da plataforma; os demais vivem dentro
// de um tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    PlatformOwner,
    Admin,
    Manager,
    Staff,
}

impl Role {
    // Papéis autorizados a entrar no console da plataforma
    pub fn is_platform(&self) -> bool {
        matches!(self, Role::PlatformOwner)
    }

    // Administradores passam em qualquer checagem de permissão fina
    pub fn is_admin_like(&self) -> bool {
        matches!(self, Role::PlatformOwner | Role::Admin)
    }
}

// ---
// 2. User (registro global, partição da plataforma)
// ---
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    pub password_hash: String,

    pub display_name: String,
    pub role: Role,

    // Escopo de quota em grupo (ex.: um setor do hospital)
    pub group_id: Option<String>,

    // Grants por usuário, somados aos defaults do papel
    pub permissions: Vec<String>,

    // Tenant ativo inicial no login; donos da plataforma não têm
    pub default_tenant_id: Option<String>,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Perfil exposto pela API (nunca devolvemos o hash)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub active_tenant_id: String,
    pub permissions: Vec<String>,
}

// ---
// 3. Session (fonte única do tenant ativo)
// ---
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub active_tenant_id: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ---
// 4. RefreshCredential (renovação de longa duração)
// ---
// Guardamos apenas o digest SHA-256; o texto puro sai uma única vez.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshCredential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub user_agent: Option<String>,
}

// ---
// 5. Claims (conteúdo do JWT de acesso)
// ---
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,          // ID do usuário
    pub sid: Uuid,          // ID da sessão (validada no banco a cada request)
    pub tenant: String,     // tenant ativo no momento da emissão
    pub role: Role,
    pub ent: Entitlements,  // entitlements resolvidos na emissão
    pub exp: usize,
    pub iat: usize,
}

// ---
// 6. Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginPayload {
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub current_password: String,
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwitchTenantPayload {
    #[validate(length(min = 1, message = "Informe o tenant de destino."))]
    pub tenant_id: String,
}

// Resposta de autenticação; os tokens viajam apenas em cookies
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserProfile,
}
