// src/services/idempotency.rs

// Execução exatamente-uma-vez por chave do cliente. Quem reivindica o
// marcador pendente (arbitragem do índice único) executa o handler; quem
// chega depois recebe o desfecho gravado VERBATIM, sem nova execução. Se o
// dono falha, a chave é liberada e o retry do cliente executa de novo.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::{
    common::error::AppError,
    db::store::{ClaimOutcome, IdempotencyStore},
    models::idempotency::{IdempotencyKey, StoredResponse},
};

// Quanto um gêmeo espera o dono pendente terminar antes de responder 409
const PENDING_WAIT_MS: u64 = 2_000;
const PENDING_POLL_MS: u64 = 100;

// Depois disso o cliente já desistiu de qualquer retry
const RETENTION_DAYS: i64 = 7;

#[derive(Clone)]
pub struct IdempotencyService {
    store: Arc<dyn IdempotencyStore>,
}

impl IdempotencyService {
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Self {
        Self { store }
    }

    // Sem chave, executa direto: idempotência é opt-in por requisição
    pub async fn execute<F, Fut>(
        &self,
        key: Option<IdempotencyKey>,
        handler: F,
    ) -> Result<StoredResponse, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StoredResponse, AppError>>,
    {
        let Some(key) = key else {
            return handler().await;
        };

        match self.store.claim(&key, Utc::now()).await? {
            ClaimOutcome::Claimed => self.run_claimed(&key, handler).await,
            ClaimOutcome::Existing(record) => {
                if let Some(stored) = record.stored_response() {
                    tracing::info!(
                        "♻️  Replay de {} {} (clientRequestId {})",
                        key.method,
                        key.pathname,
                        key.client_request_id
                    );
                    return Ok(stored);
                }
                self.await_pending(&key).await
            }
        }
    }

    async fn run_claimed<F, Fut>(
        &self,
        key: &IdempotencyKey,
        handler: F,
    ) -> Result<StoredResponse, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StoredResponse, AppError>>,
    {
        match handler().await {
            Ok(response) => {
                // Se a gravação do desfecho falhar, soltamos a chave: um
                // pendente órfão bloquearia retries para sempre
                if let Err(e) = self
                    .store
                    .complete(key, i32::from(response.status), response.body.clone())
                    .await
                {
                    tracing::error!("Falha ao gravar desfecho idempotente: {}", e);
                    if let Err(e) = self.store.release(key).await {
                        tracing::error!("Falha ao liberar chave idempotente: {}", e);
                    }
                }
                Ok(response)
            }
            Err(error) => {
                // Handler falhou: a chave volta a ficar livre para retry
                if let Err(e) = self.store.release(key).await {
                    tracing::error!("Falha ao liberar chave idempotente: {}", e);
                }
                Err(error)
            }
        }
    }

    // O dono ainda está executando: espera um pouco pelo desfecho. Se o
    // registro sumir, o dono falhou e liberou; o cliente decide reenviar.
    async fn await_pending(&self, key: &IdempotencyKey) -> Result<StoredResponse, AppError> {
        let attempts = PENDING_WAIT_MS / PENDING_POLL_MS;
        for _ in 0..attempts {
            tokio::time::sleep(Duration::from_millis(PENDING_POLL_MS)).await;

            match self.store.find(key).await? {
                Some(record) => {
                    if let Some(stored) = record.stored_response() {
                        return Ok(stored);
                    }
                }
                None => break,
            }
        }

        Err(AppError::Conflict(
            "Requisição duplicada ainda em processamento. Tente novamente.".to_string(),
        ))
    }

    // Chamada pela task periódica de manutenção
    pub async fn sweep_retention(&self) -> Result<u64, AppError> {
        let cutoff = Utc::now() - chrono::Duration::days(RETENTION_DAYS);
        self.store.purge_older_than(cutoff).await
    }
}

// O desfecho gravado vira resposta HTTP idêntica à original
impl IntoResponse for StoredResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::db::memory::MemIdempotencyStore;
    use serde_json::json;

    fn service() -> IdempotencyService {
        IdempotencyService::new(Arc::new(MemIdempotencyStore::new()))
    }

    fn chave(id: &str) -> IdempotencyKey {
        IdempotencyKey::new("hospital-sul", "POST", "/api/policy/documents", id)
    }

    #[tokio::test]
    async fn replay_sequencial_nao_executa_de_novo() {
        let service = service();
        let executions = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let executions = executions.clone();
            let response = service
                .execute(Some(chave("req-1")), move || async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(StoredResponse::new(201, json!({"id": "doc-1"})))
                })
                .await
                .unwrap();

            assert_eq!(response.status, 201);
            assert_eq!(response.body, json!({"id": "doc-1"}));
        }

        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn chaves_diferentes_executam_separado() {
        let service = service();
        let executions = Arc::new(AtomicU32::new(0));

        for id in ["req-1", "req-2"] {
            let executions = executions.clone();
            service
                .execute(Some(chave(id)), move || async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(StoredResponse::new(201, json!({"id": id})))
                })
                .await
                .unwrap();
        }

        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn falha_libera_a_chave_para_retry() {
        let service = service();

        let err = service
            .execute(Some(chave("req-1")), || async {
                Err(AppError::Conflict("quebrou".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // O retry do cliente executa de verdade
        let response = service
            .execute(Some(chave("req-1")), || async {
                Ok(StoredResponse::new(201, json!({"ok": true})))
            })
            .await
            .unwrap();
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn gemeos_concorrentes_executam_uma_vez_e_respondem_igual() {
        let service = service();
        let executions = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = service.clone();
            let executions = executions.clone();
            handles.push(tokio::spawn(async move {
                service
                    .execute(Some(chave("req-1")), move || async move {
                        // Segura o marcador pendente por um instante para os
                        // gêmeos chegarem enquanto executamos
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        let n = executions.fetch_add(1, Ordering::SeqCst);
                        Ok(StoredResponse::new(201, json!({"execution": n})))
                    })
                    .await
            }));
        }

        let mut bodies = Vec::new();
        for handle in handles {
            bodies.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        for body in &bodies {
            assert_eq!(body, &bodies[0]);
        }
    }
}
