// src/handlers/audit.rs

// Console da plataforma: leitura da trilha de auditoria. É o único caminho
// de leitura que respeita a flag transicional de linhas sem carimbo.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::guard::{Guarded, PlatformConsole},
    models::audit::AuditLogEntry,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditListParams {
    pub tenant_id: String,
    pub limit: Option<i64>,
}

// GET /api/admin/audit?tenantId=...&limit=...
#[utoipa::path(
    get,
    path = "/api/admin/audit",
    tag = "Console",
    params(
        ("tenantId" = String, Query, description = "Chave do tenant"),
        ("limit" = Option<i64>, Query, description = "Máximo de linhas (default 100)")
    ),
    responses((status = 200, description = "Trilha recente do tenant", body = [AuditLogEntry])),
    security(("session_cookie" = []))
)]
pub async fn list_audit(
    State(app_state): State<AppState>,
    _guard: Guarded<PlatformConsole>,
    Query(params): Query<AuditListParams>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    let limit = params.limit.unwrap_or(100).clamp(1, 500);

    let entries = app_state
        .audit_logger
        .list_recent(&params.tenant_id, app_state.untagged_fallback, limit)
        .await?;

    Ok(Json(entries))
}
