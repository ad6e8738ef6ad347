// tests/tenant_scoping.rs

// O tenant de cada requisição vem SOMENTE da sessão. Estes testes cobrem as
// quatro portas de recusa (papel, entitlement, permissão, tenant bloqueado),
// o sentinela do console e a troca de tenant ativo.

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use serde_json::{Value, json};

use common::harness::{ADMIN, Gateway, MANAGER, OWNER, STAFF, TENANT_NORTE, TENANT_SUL};
use hospital_gateway::models::tenancy::TenantStatus;

const X_TENANT_ID: HeaderName = HeaderName::from_static("x-tenant-id");

mod fonte_do_tenant {
    use super::*;

    #[tokio::test]
    async fn header_e_query_de_tenant_nao_tem_voz() {
        let gateway = Gateway::spawn().await;
        gateway.seed_document(TENANT_SUL, "Protocolo de Higiene").await;
        gateway.seed_document(TENANT_NORTE, "Protocolo da Norte").await;

        gateway.login(STAFF).await;

        // Cliente tenta apontar para outro tenant por header e por query;
        // a sessão (hospital-sul) decide mesmo assim
        let response = gateway
            .server
            .get("/api/policy/documents")
            .add_header(X_TENANT_ID, HeaderValue::from_static("clinica-norte"))
            .add_query_param("tenantId", TENANT_NORTE)
            .await;
        response.assert_status_ok();

        let documents: Vec<Value> = response.json();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0]["tenantId"], TENANT_SUL);
        assert_eq!(documents[0]["title"], "Protocolo de Higiene");
    }

    #[tokio::test]
    async fn rota_protegida_sem_sessao_usa_a_mensagem_fixa() {
        let gateway = Gateway::spawn().await;

        let response = gateway.server.get("/api/policy/documents").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.json::<Value>()["message"],
            "Tenant not selected. Please log in again."
        );
    }
}

mod escopo_e_recusas {
    use super::*;

    #[tokio::test]
    async fn console_recusa_admin_de_tenant_com_motivo_role() {
        let gateway = Gateway::spawn().await;
        gateway.login(ADMIN).await;

        let response = gateway.server.get("/api/admin/tenants").await;
        response.assert_status(StatusCode::FORBIDDEN);

        let body: Value = response.json();
        assert_eq!(body["error"], "Forbidden");
        assert_eq!(body["reason"], "role");
    }

    #[tokio::test]
    async fn sentinela_nao_entra_em_rota_de_tenant() {
        let gateway = Gateway::spawn().await;
        gateway.login(OWNER).await;

        let response = gateway.server.get("/api/policy/documents").await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<Value>()["reason"], "role");
    }

    #[tokio::test]
    async fn modulo_desabilitado_recusa_com_motivo_entitlement() {
        let gateway = Gateway::spawn().await;

        // O console desliga o módulo policy da clinica-norte
        gateway.login(OWNER).await;
        let corte = gateway
            .server
            .put(&format!("/api/admin/tenants/{TENANT_NORTE}/entitlements"))
            .json(&json!({
                "entitlements": { "policy": false, "clinical": false, "imaging": false, "training": false }
            }))
            .await;
        corte.assert_status_ok();

        // A revogação vale já na próxima requisição da sessão do tenant
        gateway.login(MANAGER).await;
        let troca = gateway
            .server
            .post("/api/auth/switch-tenant")
            .json(&json!({ "tenantId": TENANT_NORTE }))
            .await;
        troca.assert_status_ok();

        let response = gateway.server.get("/api/policy/documents").await;
        response.assert_status(StatusCode::FORBIDDEN);

        let body: Value = response.json();
        assert_eq!(body["reason"], "entitlement");
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .contains("policy")
        );
    }

    #[tokio::test]
    async fn escrita_sem_grant_recusa_com_motivo_permission() {
        let gateway = Gateway::spawn().await;
        gateway.login(STAFF).await;

        let response = gateway
            .server
            .post("/api/policy/documents")
            .json(&json!({ "title": "Rascunho", "content": "..." }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let body: Value = response.json();
        assert_eq!(body["reason"], "permission");
        assert_eq!(body["message"], "Permissão necessária: policy.documents.write");
    }

    #[tokio::test]
    async fn bloqueio_administrativo_vale_no_meio_da_sessao() {
        let gateway = Gateway::spawn().await;
        gateway.login(STAFF).await;
        gateway.server.get("/api/users/me").await.assert_status_ok();

        gateway
            .tenants
            .set_status(TENANT_SUL, TenantStatus::Blocked)
            .await;

        // O JWT segue válido; a revalidação no diretório barra na hora
        let bloqueado = gateway.server.get("/api/policy/documents").await;
        bloqueado.assert_status(StatusCode::FORBIDDEN);

        let body: Value = bloqueado.json();
        assert_eq!(body["reason"], "tenant_blocked");
        assert_eq!(body["message"], "Este tenant está bloqueado.");

        // Desbloquear devolve o acesso sem novo login
        gateway
            .tenants
            .set_status(TENANT_SUL, TenantStatus::Active)
            .await;
        gateway.server.get("/api/policy/documents").await.assert_status_ok();
    }

    #[tokio::test]
    async fn tenant_arquivado_falha_fechado_como_desconhecido() {
        let gateway = Gateway::spawn().await;
        gateway.login(STAFF).await;

        gateway
            .tenants
            .set_status(TENANT_SUL, TenantStatus::Archived)
            .await;

        let response = gateway.server.get("/api/policy/documents").await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["message"], "Tenant desconhecido.");
    }
}

mod troca_de_tenant {
    use super::*;

    #[tokio::test]
    async fn membro_troca_e_o_escopo_acompanha_a_sessao() {
        let gateway = Gateway::spawn().await;
        gateway.seed_document(TENANT_NORTE, "Protocolo da Norte").await;

        gateway.login(MANAGER).await;

        let troca = gateway
            .server
            .post("/api/auth/switch-tenant")
            .json(&json!({ "tenantId": TENANT_NORTE }))
            .await;
        troca.assert_status_ok();
        assert_eq!(troca.json::<Value>()["user"]["activeTenantId"], TENANT_NORTE);

        // O novo JWT no cookie aponta para a norte; a listagem muda junto
        let me = gateway.server.get("/api/users/me").await;
        assert_eq!(me.json::<Value>()["user"]["activeTenantId"], TENANT_NORTE);

        let documents = gateway.server.get("/api/policy/documents").await;
        documents.assert_status_ok();
        let lista: Vec<Value> = documents.json();
        assert_eq!(lista.len(), 1);
        assert_eq!(lista[0]["tenantId"], TENANT_NORTE);
    }

    #[tokio::test]
    async fn quem_nao_e_membro_nao_troca() {
        let gateway = Gateway::spawn().await;
        gateway.login(STAFF).await;

        let response = gateway
            .server
            .post("/api/auth/switch-tenant")
            .json(&json!({ "tenantId": TENANT_NORTE }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(
            response.json::<Value>()["message"],
            "Você não pertence a este tenant."
        );
    }

    #[tokio::test]
    async fn destino_desconhecido_e_404_e_sentinela_exige_papel_de_plataforma() {
        let gateway = Gateway::spawn().await;
        gateway.login(STAFF).await;

        let desconhecido = gateway
            .server
            .post("/api/auth/switch-tenant")
            .json(&json!({ "tenantId": "hospital-fantasma" }))
            .await;
        desconhecido.assert_status(StatusCode::NOT_FOUND);

        let sentinela = gateway
            .server
            .post("/api/auth/switch-tenant")
            .json(&json!({ "tenantId": "platform" }))
            .await;
        sentinela.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn dona_da_plataforma_circula_entre_console_e_tenant() {
        let gateway = Gateway::spawn().await;
        gateway.login(OWNER).await;

        // Papel de plataforma dispensa vínculo de membro
        let para_tenant = gateway
            .server
            .post("/api/auth/switch-tenant")
            .json(&json!({ "tenantId": TENANT_SUL }))
            .await;
        para_tenant.assert_status_ok();

        // Fora do sentinela o console fecha
        gateway
            .server
            .get("/api/admin/tenants")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let de_volta = gateway
            .server
            .post("/api/auth/switch-tenant")
            .json(&json!({ "tenantId": "platform" }))
            .await;
        de_volta.assert_status_ok();
        gateway.server.get("/api/admin/tenants").await.assert_status_ok();
    }
}
