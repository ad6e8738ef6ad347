// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use crate::handlers;
use crate::middleware::session::AUTH_COOKIE;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::change_password,
        handlers::auth::switch_tenant,

        // --- Users ---
        handlers::auth::get_me,

        // --- Policy ---
        handlers::policy::list_documents,
        handlers::policy::create_document,

        // --- Console ---
        handlers::tenancy::provision_tenant,
        handlers::tenancy::list_tenants,
        handlers::tenancy::update_entitlements,
        handlers::quotas::create_quota,
        handlers::quotas::update_quota,
        handlers::quotas::list_quotas,
        handlers::audit::list_audit,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::UserProfile,
            models::auth::LoginPayload,
            models::auth::ChangePasswordPayload,
            models::auth::SwitchTenantPayload,
            models::auth::AuthResponse,

            // --- Tenancy ---
            models::tenancy::PlatformKey,
            models::tenancy::Entitlements,
            models::tenancy::TenantStatus,
            models::tenancy::Tenant,
            models::tenancy::ContractStatus,
            models::tenancy::SubscriptionContract,
            models::tenancy::ProvisionTenantPayload,
            models::tenancy::UpdateEntitlementsPayload,

            // --- Quotas ---
            models::quota::QuotaScope,
            models::quota::QuotaStatus,
            models::quota::UsageQuota,
            models::quota::CreateQuotaPayload,
            models::quota::UpdateQuotaPayload,

            // --- Policy ---
            models::policy::PolicyDocument,
            models::policy::CreatePolicyDocumentPayload,

            // --- Audit ---
            models::audit::AuditLogEntry,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação, Sessão e Troca de Tenant"),
        (name = "Users", description = "Dados do Usuário e Perfil"),
        (name = "Policy", description = "Biblioteca de Políticas do Hospital"),
        (name = "Console", description = "Console da Plataforma (Tenants, Quotas e Auditoria)")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        // O token de acesso viaja só em cookie HttpOnly, nunca em header Bearer
        components.add_security_scheme(
            "session_cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(AUTH_COOKIE))),
        );
    }
}
