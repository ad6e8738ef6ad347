// src/handlers/tenancy.rs

// Console da plataforma: provisionamento e diretório de tenants. Todas as
// rotas aqui exigem a sessão no tenant sentinela.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::guard::{Guarded, PlatformConsole},
    models::audit::AuditEvent,
    models::tenancy::{ProvisionTenantPayload, Tenant, UpdateEntitlementsPayload},
};

// POST /api/admin/tenants
#[utoipa::path(
    post,
    path = "/api/admin/tenants",
    tag = "Console",
    request_body = ProvisionTenantPayload,
    responses(
        (status = 201, description = "Tenant provisionado com partição e contrato", body = Tenant),
        (status = 409, description = "tenant_id já existe")
    ),
    security(("session_cookie" = []))
)]
pub async fn provision_tenant(
    State(app_state): State<AppState>,
    guard: Guarded<PlatformConsole>,
    Json(payload): Json<ProvisionTenantPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let tenant = app_state.tenancy_service.provision(payload).await?;

    app_state.audit_logger.record(
        AuditEvent::new(tenant.tenant_id.clone(), "tenant.provision", "tenant")
            .actor(guard.ctx.user_id())
            .resource(tenant.tenant_id.clone()),
    );

    Ok((StatusCode::CREATED, Json(tenant)))
}

// GET /api/admin/tenants
#[utoipa::path(
    get,
    path = "/api/admin/tenants",
    tag = "Console",
    responses((status = 200, description = "Diretório de tenants", body = [Tenant])),
    security(("session_cookie" = []))
)]
pub async fn list_tenants(
    State(app_state): State<AppState>,
    _guard: Guarded<PlatformConsole>,
) -> Result<Json<Vec<Tenant>>, AppError> {
    Ok(Json(app_state.tenancy_service.list().await?))
}

// PUT /api/admin/tenants/{tenant_id}/entitlements
#[utoipa::path(
    put,
    path = "/api/admin/tenants/{tenant_id}/entitlements",
    tag = "Console",
    request_body = UpdateEntitlementsPayload,
    params(("tenant_id" = String, Path, description = "Chave do tenant")),
    responses(
        (status = 200, description = "Flags de módulo atualizadas", body = Tenant),
        (status = 404, description = "Tenant desconhecido")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_entitlements(
    State(app_state): State<AppState>,
    guard: Guarded<PlatformConsole>,
    Path(tenant_id): Path<String>,
    Json(payload): Json<UpdateEntitlementsPayload>,
) -> Result<Json<Tenant>, AppError> {
    let entitlements = payload.entitlements;
    let tenant = app_state
        .tenancy_service
        .update_entitlements(&tenant_id, entitlements)
        .await?;

    let metadata = serde_json::to_value(entitlements).map_err(anyhow::Error::from)?;
    app_state.audit_logger.record(
        AuditEvent::new(tenant_id.clone(), "tenant.entitlements.update", "tenant")
            .actor(guard.ctx.user_id())
            .resource(tenant_id.clone())
            .metadata(metadata),
    );

    Ok(Json(tenant))
}
