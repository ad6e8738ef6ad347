// src/models/audit.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// ---
// 1. AuditLogEntry (append-only)
// ---
// Escrita uma vez, nunca atualizada. `tenant_id` é opcional apenas na
// LEITURA: linhas antigas, anteriores ao particionamento estrito, podem não
// ter carimbo. Toda escrita nova carimba o tenant.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub tenant_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub ip: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

// ---
// 2. AuditEvent (o que as services enfileiram)
// ---
// Builder enxuto; o worker converte em linha e persiste.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor_user_id: Option<Uuid>,
    pub tenant_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub ip: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(tenant_id: impl Into<String>, action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            actor_user_id: None,
            tenant_id: tenant_id.into(),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            success: true,
            error_message: None,
            ip: None,
            method: None,
            path: None,
            metadata: None,
        }
    }

    pub fn actor(mut self, user_id: Uuid) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn resource(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self
    }

    pub fn metadata(mut self, value: serde_json::Value) -> Self {
        self.metadata = Some(value);
        self
    }

    pub fn request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.path = Some(path.into());
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    // Linha pronta para persistir; toda escrita nova carimba o tenant
    pub fn into_entry(self) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            actor_user_id: self.actor_user_id,
            tenant_id: Some(self.tenant_id),
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            success: self.success,
            error_message: self.error_message,
            ip: self.ip,
            method: self.method,
            path: self.path,
            metadata: self.metadata,
            timestamp: Utc::now(),
        }
    }
}
