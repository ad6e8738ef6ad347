// src/services/audit.rs

// Trilha de auditoria fire-and-forget: o handler enfileira o evento e segue
// sem esperar o banco. Uma task desanexada persiste em ordem de chegada;
// falha de auditoria NUNCA falha a operação principal, o evento é
// descartado com warn.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::mpsc;

use crate::{
    common::error::AppError,
    db::store::AuditStore,
    models::audit::{AuditEvent, AuditLogEntry},
};

const RETENTION_DAYS: i64 = 365;

#[derive(Clone)]
pub struct AuditLogger {
    tx: mpsc::UnboundedSender<AuditEvent>,
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    // Sobe a task gravadora; precisa de um runtime tokio vivo
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEvent>();

        let writer = store.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let entry = event.into_entry();
                if let Err(e) = writer.append(&entry).await {
                    tracing::warn!("📝 Evento de auditoria descartado: {}", e);
                }
            }
        });

        Self { tx, store }
    }

    // Não falha e não espera: o caminho quente só paga o custo do send
    pub fn record(&self, event: AuditEvent) {
        if self.tx.send(event).is_err() {
            tracing::warn!("📝 Canal de auditoria fechado; evento descartado");
        }
    }

    pub async fn list_recent(
        &self,
        tenant_id: &str,
        include_untagged: bool,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        self.store
            .list_for_tenant(tenant_id, include_untagged, limit)
            .await
    }

    // Chamada pela task periódica de manutenção
    pub async fn sweep_retention(&self) -> Result<u64, AppError> {
        let cutoff = Utc::now() - Duration::days(RETENTION_DAYS);
        self.store.purge_older_than(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemAuditStore;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn evento_enfileirado_chega_ao_store() {
        let store = Arc::new(MemAuditStore::new());
        let logger = AuditLogger::new(store.clone());

        logger.record(
            AuditEvent::new("hospital-sul", "policy.document.create", "policy_document")
                .resource("doc-1"),
        );

        // A gravação é assíncrona; dá um fôlego para a task desanexada
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        let entries = store.snapshot().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tenant_id.as_deref(), Some("hospital-sul"));
        assert_eq!(entries[0].action, "policy.document.create");
        assert!(entries[0].success);
    }

    #[tokio::test]
    async fn falha_registrada_carrega_mensagem() {
        let store = Arc::new(MemAuditStore::new());
        let logger = AuditLogger::new(store.clone());

        logger.record(
            AuditEvent::new("hospital-sul", "auth.login", "session").failed("senha incorreta"),
        );

        tokio::time::sleep(StdDuration::from_millis(50)).await;

        let entries = store.snapshot().await;
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
        assert_eq!(entries[0].error_message.as_deref(), Some("senha incorreta"));
    }
}
