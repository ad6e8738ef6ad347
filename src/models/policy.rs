// src/models/policy.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// ---
// 1. PolicyDocument (biblioteca de políticas do hospital)
// ---
// Vive na partição do tenant, na tabela `policy_documents` (prefixo do
// módulo). Módulo representativo que atravessa o gateway inteiro.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    pub id: Uuid,
    pub tenant_id: String,
    pub title: String,
    pub category: Option<String>,
    pub content: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// 2. Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePolicyDocumentPayload {
    #[validate(length(min = 1, max = 200, message = "O título deve ter entre 1 e 200 caracteres."))]
    pub title: String,
    #[validate(length(max = 80, message = "Categoria longa demais."))]
    pub category: Option<String>,
    #[validate(length(min = 1, message = "O conteúdo não pode ser vazio."))]
    pub content: String,

    // Chave de idempotência do cliente; repetida = replay da resposta gravada
    pub client_request_id: Option<String>,
}
