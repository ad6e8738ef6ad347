// src/models/quota.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// ---
// 1. Escopo e status da quota
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "quota_scope", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuotaScope {
    User,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "quota_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuotaStatus {
    Active,
    Locked,
}

// ---
// 2. UsageQuota
// ---
// Podem existir duas para a mesma feature (uma por usuário, uma por grupo);
// a de usuário SEMPRE sombreia a de grupo na admissão.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageQuota {
    pub id: Uuid,
    pub tenant_id: String,
    pub scope_type: QuotaScope,

    // ID do usuário ou do grupo, conforme o escopo
    pub scope_id: String,

    pub feature_key: String,

    // Sem limite = só a janela de tempo restringe
    #[serde(rename = "limit")]
    pub limit_count: Option<i32>,
    #[serde(rename = "used")]
    pub used_count: i32,

    pub status: QuotaStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UsageQuota {
    // Válida para fiscalização: ativa e dentro da janela de vigência.
    // Uma quota travada ou vencida não sombreia a de grupo.
    pub fn is_enforceable(&self, now: DateTime<Utc>) -> bool {
        if self.status != QuotaStatus::Active {
            return false;
        }
        if let Some(starts) = self.starts_at {
            if now < starts {
                return false;
            }
        }
        match self.ends_at {
            Some(ends) => now < ends,
            None => true,
        }
    }

    pub fn available(&self) -> Option<i32> {
        self.limit_count.map(|limit| (limit - self.used_count).max(0))
    }
}

// ---
// 3. Resultado da admissão
// ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    // Nenhuma quota aplicável: admite sem contar
    Unrestricted,
    Admitted {
        quota_id: Uuid,
        scope_type: QuotaScope,
        remaining: Option<i32>,
    },
}

// ---
// 4. Payloads do console
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuotaPayload {
    #[validate(length(min = 1, message = "Informe o tenant."))]
    pub tenant_id: String,
    pub scope_type: QuotaScope,
    #[validate(length(min = 1, message = "Informe o escopo (usuário ou grupo)."))]
    pub scope_id: String,
    #[validate(length(min = 1, max = 120, message = "featureKey inválida."))]
    pub feature_key: String,

    #[validate(range(min = 0, message = "O limite não pode ser negativo."))]
    pub limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

// Substitui limite e vigência; ausente = remove. A service rejeita o
// resultado sem limite E sem vigência (quota infiscalizável).
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuotaPayload {
    #[validate(range(min = 0, message = "O limite não pode ser negativo."))]
    pub limit: Option<i32>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: Option<QuotaStatus>,
}
