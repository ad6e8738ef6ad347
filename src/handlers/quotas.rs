// src/handlers/quotas.rs

// Console da plataforma: administração de quotas de uso.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::guard::{Guarded, PlatformConsole},
    models::audit::AuditEvent,
    models::quota::{CreateQuotaPayload, UpdateQuotaPayload, UsageQuota},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaListParams {
    pub tenant_id: String,
}

// POST /api/admin/quotas
#[utoipa::path(
    post,
    path = "/api/admin/quotas",
    tag = "Console",
    request_body = CreateQuotaPayload,
    responses(
        (status = 201, description = "Quota criada (ou limites substituídos na chave existente)", body = UsageQuota),
        (status = 400, description = "Quota sem limite e sem vigência"),
        (status = 404, description = "Tenant desconhecido")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_quota(
    State(app_state): State<AppState>,
    guard: Guarded<PlatformConsole>,
    Json(payload): Json<CreateQuotaPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    // Confirma o tenant no diretório antes de criar a quota (falha fechada)
    app_state.tenancy_service.resolve(&payload.tenant_id).await?;

    let quota = app_state.quota_service.create(payload).await?;

    app_state.audit_logger.record(
        AuditEvent::new(quota.tenant_id.clone(), "quota.create", "usage_quota")
            .actor(guard.ctx.user_id())
            .resource(quota.id.to_string())
            .metadata(json!({
                "featureKey": quota.feature_key,
                "scopeType": quota.scope_type,
                "limit": quota.limit_count,
            })),
    );

    Ok((StatusCode::CREATED, Json(quota)))
}

// PUT /api/admin/quotas/{id}
#[utoipa::path(
    put,
    path = "/api/admin/quotas/{id}",
    tag = "Console",
    request_body = UpdateQuotaPayload,
    params(("id" = Uuid, Path, description = "ID da quota")),
    responses(
        (status = 200, description = "Limite, vigência e status substituídos", body = UsageQuota),
        (status = 400, description = "A atualização deixaria a quota infiscalizável"),
        (status = 404, description = "Quota desconhecida")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_quota(
    State(app_state): State<AppState>,
    guard: Guarded<PlatformConsole>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuotaPayload>,
) -> Result<Json<UsageQuota>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let quota = app_state.quota_service.update(id, payload).await?;

    app_state.audit_logger.record(
        AuditEvent::new(quota.tenant_id.clone(), "quota.update", "usage_quota")
            .actor(guard.ctx.user_id())
            .resource(quota.id.to_string())
            .metadata(json!({
                "limit": quota.limit_count,
                "endsAt": quota.ends_at,
                "status": quota.status,
            })),
    );

    Ok(Json(quota))
}

// GET /api/admin/quotas?tenantId=...
#[utoipa::path(
    get,
    path = "/api/admin/quotas",
    tag = "Console",
    params(("tenantId" = String, Query, description = "Chave do tenant")),
    responses((status = 200, description = "Quotas do tenant", body = [UsageQuota])),
    security(("session_cookie" = []))
)]
pub async fn list_quotas(
    State(app_state): State<AppState>,
    _guard: Guarded<PlatformConsole>,
    Query(params): Query<QuotaListParams>,
) -> Result<Json<Vec<UsageQuota>>, AppError> {
    let quotas = app_state
        .quota_service
        .list_for_tenant(&params.tenant_id)
        .await?;
    Ok(Json(quotas))
}
