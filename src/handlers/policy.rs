// src/handlers/policy.rs

use axum::{Json, extract::State};
use serde_json::json;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::guard::{Guarded, PolicyRead, PolicyWrite},
    models::audit::AuditEvent,
    models::idempotency::{IdempotencyKey, StoredResponse},
    models::policy::{CreatePolicyDocumentPayload, PolicyDocument},
};

// Feature medida por quota neste módulo
pub const FEATURE_POLICY_SEARCH: &str = "policy.search";

const DOCUMENTS_PATH: &str = "/api/policy/documents";

// GET /api/policy/documents
#[utoipa::path(
    get,
    path = "/api/policy/documents",
    tag = "Policy",
    responses(
        (status = 200, description = "Documentos do tenant ativo", body = [PolicyDocument]),
        (status = 403, description = "Sem entitlement, sem permissão ou quota excedida")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_documents(
    State(app_state): State<AppState>,
    guard: Guarded<PolicyRead>,
) -> Result<Json<Vec<PolicyDocument>>, AppError> {
    let ctx = &guard.ctx;

    // A busca é a feature medida: admite (e conta) ANTES de tocar o banco
    if let Err(error) = app_state
        .quota_service
        .admit(
            &ctx.tenant_id,
            ctx.user_id(),
            ctx.group_id(),
            FEATURE_POLICY_SEARCH,
        )
        .await
    {
        if matches!(error, AppError::QuotaExceeded { .. }) {
            app_state.audit_logger.record(
                AuditEvent::new(ctx.tenant_id.clone(), "quota.denied", "usage_quota")
                    .actor(ctx.user_id())
                    .metadata(json!({ "featureKey": FEATURE_POLICY_SEARCH })),
            );
        }
        return Err(error);
    }

    let documents = app_state
        .policy_service
        .list_documents(&ctx.tenant_id)
        .await?;
    Ok(Json(documents))
}

// POST /api/policy/documents
#[utoipa::path(
    post,
    path = "/api/policy/documents",
    tag = "Policy",
    request_body = CreatePolicyDocumentPayload,
    responses(
        (status = 201, description = "Documento criado (ou replay do desfecho gravado)", body = PolicyDocument),
        (status = 403, description = "Sem entitlement ou sem permissão de escrita"),
        (status = 409, description = "Requisição duplicada ainda em processamento")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_document(
    State(app_state): State<AppState>,
    guard: Guarded<PolicyWrite>,
    Json(payload): Json<CreatePolicyDocumentPayload>,
) -> Result<StoredResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let tenant_id = guard.ctx.tenant_id.clone();
    let user_id = guard.ctx.user_id();

    // Mesma chave do cliente em outro tenant ou outra rota é outra requisição
    let key = payload
        .client_request_id
        .as_deref()
        .map(|id| IdempotencyKey::new(tenant_id.clone(), "POST", DOCUMENTS_PATH, id));

    let state = app_state.clone();
    let response = app_state
        .idempotency_service
        .execute(key, move || async move {
            let document = state
                .policy_service
                .create_document(&tenant_id, user_id, &payload)
                .await?;

            state.audit_logger.record(
                AuditEvent::new(tenant_id.clone(), "policy.document.create", "policy_document")
                    .actor(user_id)
                    .resource(document.id.to_string()),
            );

            let body = serde_json::to_value(&document).map_err(anyhow::Error::from)?;
            Ok(StoredResponse::new(201, body))
        })
        .await?;

    Ok(response)
}
