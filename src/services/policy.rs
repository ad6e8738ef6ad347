// src/services/policy.rs

// Biblioteca de políticas do hospital. O serviço é propositalmente fino: a
// admissão por quota e a idempotência acontecem no handler, antes de chegar
// aqui; isto só escreve e lê na partição do tenant.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::PolicyDocumentStore,
    models::policy::{CreatePolicyDocumentPayload, PolicyDocument},
};

#[derive(Clone)]
pub struct PolicyService {
    documents: Arc<dyn PolicyDocumentStore>,
}

impl PolicyService {
    pub fn new(documents: Arc<dyn PolicyDocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn create_document(
        &self,
        tenant_id: &str,
        created_by: Uuid,
        payload: &CreatePolicyDocumentPayload,
    ) -> Result<PolicyDocument, AppError> {
        let now = Utc::now();
        let document = PolicyDocument {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            title: payload.title.clone(),
            category: payload.category.clone(),
            content: payload.content.clone(),
            created_by,
            created_at: now,
            updated_at: now,
        };

        self.documents.insert(&document).await?;
        tracing::info!("📄 Documento '{}' criado em '{}'", document.title, tenant_id);
        Ok(document)
    }

    pub async fn list_documents(&self, tenant_id: &str) -> Result<Vec<PolicyDocument>, AppError> {
        self.documents.list_for_tenant(tenant_id).await
    }
}
