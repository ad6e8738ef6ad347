use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::models::quota::QuotaScope;

// Mensagem fixa do contrato de sessão ausente/inválida. Clientes dependem
// dela para redirecionar ao login; não traduzir.
pub const NO_SESSION_MESSAGE: &str = "Tenant not selected. Please log in again.";

// Motivo tipado de um 403, para o cliente rotear a experiência certa
// (ex.: "entitlement" leva à tela de upgrade, não a uma página de erro).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    Role,
    Entitlement,
    Permission,
    TenantBlocked,
}

impl ForbiddenReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForbiddenReason::Role => "role",
            ForbiddenReason::Entitlement => "entitlement",
            ForbiddenReason::Permission => "permission",
            ForbiddenReason::TenantBlocked => "tenant_blocked",
        }
    }
}

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    // Sessão ausente, inválida ou expirada; recuperável com novo login
    #[error("Não autenticado: {message}")]
    Unauthorized { message: &'static str },

    // Autenticado, porém barrado; o motivo viaja no corpo
    #[error("Acesso negado ({})", reason.as_str())]
    Forbidden {
        reason: ForbiddenReason,
        message: String,
    },

    // Recusa de negócio, não falha de servidor; o corpo carrega o contexto
    // para o cliente montar a experiência de limite atingido
    #[error("Quota excedida para {feature_key}")]
    QuotaExceeded {
        feature_key: String,
        limit: Option<i32>,
        used: i32,
        available: i32,
        scope_type: QuotaScope,
    },

    // Tenant/recurso desconhecido: falha FECHADA, nunca consulta sem escopo
    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("Conflito: {0}")]
    Conflict(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro ao migrar partição")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    // Contrato de sessão ausente (cookie faltando, JWT inválido, sessão morta)
    pub fn no_session() -> Self {
        AppError::Unauthorized {
            message: NO_SESSION_MESSAGE,
        }
    }

    // Uma única mensagem para "não existe / revogado / vencido": não damos
    // pista de qual caso ocorreu (resistência a enumeração)
    pub fn invalid_refresh() -> Self {
        AppError::Unauthorized {
            message: "Credencial de renovação inválida.",
        }
    }

    pub fn forbidden_role() -> Self {
        AppError::Forbidden {
            reason: ForbiddenReason::Role,
            message: "Seu papel não dá acesso a esta rota.".to_string(),
        }
    }

    pub fn forbidden_entitlement(platform: &str) -> Self {
        AppError::Forbidden {
            reason: ForbiddenReason::Entitlement,
            message: format!("O módulo '{platform}' não está habilitado para este tenant."),
        }
    }

    pub fn forbidden_permission(permission: &str) -> Self {
        AppError::Forbidden {
            reason: ForbiddenReason::Permission,
            message: format!("Permissão necessária: {permission}"),
        }
    }

    pub fn tenant_blocked() -> Self {
        AppError::Forbidden {
            reason: ForbiddenReason::TenantBlocked,
            message: "Este tenant está bloqueado.".to_string(),
        }
    }

    pub fn tenant_not_found() -> Self {
        AppError::NotFound("Tenant desconhecido.".to_string())
    }

    // Erro de validação montado à mão, no mesmo formato dos do derive
    pub fn validation(field: &'static str, code: &'static str, message: &str) -> Self {
        let mut errors = validator::ValidationErrors::new();
        let mut error = validator::ValidationError::new(code);
        error.message = Some(message.to_string().into());
        errors.add(field, error);
        AppError::ValidationError(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            // Retornar todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Validation",
                    "message": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }

            AppError::InvalidCredentials => {
                let body = Json(json!({
                    "error": "Unauthorized",
                    "message": "E-mail ou senha inválidos.",
                }));
                (StatusCode::UNAUTHORIZED, body).into_response()
            }

            AppError::Unauthorized { message } => {
                let body = Json(json!({
                    "error": "Unauthorized",
                    "message": message,
                }));
                (StatusCode::UNAUTHORIZED, body).into_response()
            }

            AppError::Forbidden { reason, message } => {
                // Cada recusa precisa ser distinguível no log, mesmo que o
                // status HTTP coincida
                tracing::warn!(reason = reason.as_str(), "acesso negado: {}", message);
                let body = Json(json!({
                    "error": "Forbidden",
                    "reason": reason.as_str(),
                    "message": message,
                }));
                (StatusCode::FORBIDDEN, body).into_response()
            }

            AppError::QuotaExceeded {
                feature_key,
                limit,
                used,
                available,
                scope_type,
            } => {
                let body = Json(json!({
                    "error": "QuotaExceeded",
                    "message": "Usage limit reached for this feature.",
                    "featureKey": feature_key,
                    "limit": limit,
                    "used": used,
                    "available": available,
                    "scopeType": scope_type,
                }));
                (StatusCode::FORBIDDEN, body).into_response()
            }

            AppError::NotFound(message) => {
                let body = Json(json!({
                    "error": "NotFound",
                    "message": message,
                }));
                (StatusCode::NOT_FOUND, body).into_response()
            }

            AppError::Conflict(message) => {
                let body = Json(json!({
                    "error": "Conflict",
                    "message": message,
                }));
                (StatusCode::CONFLICT, body).into_response()
            }

            // Todos os outros erros (DatabaseError, InternalServerError...)
            // viram 500. O cliente recebe uma mensagem genérica; o detalhe
            // fica no log.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                let body = Json(json!({
                    "error": "Internal",
                    "message": "Ocorreu um erro inesperado.",
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn sessao_ausente_vira_401_com_mensagem_fixa() {
        let resp = AppError::no_session().into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn quota_excedida_vira_403() {
        let err = AppError::QuotaExceeded {
            feature_key: "policy.search".to_string(),
            limit: Some(10),
            used: 10,
            available: 0,
            scope_type: QuotaScope::User,
        };
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn tenant_desconhecido_falha_fechado_com_404() {
        let resp = AppError::tenant_not_found().into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
