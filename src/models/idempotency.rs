// src/models/idempotency.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---
// 1. IdempotencyRecord
// ---
// Único por (tenant, método, rota, clientRequestId). Nasce como marcador
// pendente (sem resposta) e é completado uma única vez com o desfecho do
// handler; depois disso nunca muda.
#[derive(Debug, Clone, FromRow)]
pub struct IdempotencyRecord {
    pub tenant_id: String,
    pub method: String,
    pub pathname: String,
    pub client_request_id: String,
    pub response_status: Option<i32>,
    pub response_body: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl IdempotencyRecord {
    pub fn is_completed(&self) -> bool {
        self.response_status.is_some()
    }

    // Desfecho reproduzível, presente só depois de completado
    pub fn stored_response(&self) -> Option<StoredResponse> {
        match (self.response_status, &self.response_body) {
            (Some(status), Some(body)) => Some(StoredResponse {
                status: status.clamp(100, 599) as u16,
                body: body.clone(),
            }),
            _ => None,
        }
    }
}

// Chave completa de deduplicação. O mesmo clientRequestId em outra rota,
// outro método ou outro tenant é outra requisição.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    pub tenant_id: String,
    pub method: String,
    pub pathname: String,
    pub client_request_id: String,
}

impl IdempotencyKey {
    pub fn new(
        tenant_id: impl Into<String>,
        method: impl Into<String>,
        pathname: impl Into<String>,
        client_request_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            method: method.into(),
            pathname: pathname.into(),
            client_request_id: client_request_id.into(),
        }
    }
}

// ---
// 2. StoredResponse (desfecho reproduzível)
// ---
// O que devolvemos no replay: mesmo status, mesmo corpo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl StoredResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }
}
