// tests/quota_gate.rs

// Enforcement de quota na rota medida (a busca de documentos). Cobre a
// precedência usuário sobre grupo, a contagem compartilhada do grupo, o
// fail-open sem quota e a administração de limites pelo console.

mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::harness::{GROUP_UTI, Gateway, MANAGER, OWNER, STAFF, TENANT_SUL};
use hospital_gateway::db::store::QuotaStore;
use hospital_gateway::handlers::policy::FEATURE_POLICY_SEARCH;
use hospital_gateway::models::quota::QuotaScope;

mod precedencia {
    use super::*;

    #[tokio::test]
    async fn quota_de_usuario_cheia_nega_mesmo_com_folga_no_grupo() {
        let gateway = Gateway::spawn().await;
        let staff_scope = gateway.staff_id.to_string();
        gateway
            .seed_quota(QuotaScope::User, &staff_scope, FEATURE_POLICY_SEARCH, Some(2), 2)
            .await;
        gateway
            .seed_quota(QuotaScope::Group, GROUP_UTI, FEATURE_POLICY_SEARCH, Some(100), 0)
            .await;

        gateway.login(STAFF).await;
        let response = gateway.server.get("/api/policy/documents").await;
        response.assert_status(StatusCode::FORBIDDEN);

        // A recusa reporta os números da quota de USUÁRIO, não os do grupo
        let body: Value = response.json();
        assert_eq!(body["error"], "QuotaExceeded");
        assert_eq!(body["featureKey"], "policy.search");
        assert_eq!(body["scopeType"], "user");
        assert_eq!(body["limit"], 2);
        assert_eq!(body["used"], 2);
        assert_eq!(body["available"], 0);
    }

    #[tokio::test]
    async fn grupo_conta_para_todos_os_membros() {
        let gateway = Gateway::spawn().await;
        gateway
            .seed_quota(QuotaScope::Group, GROUP_UTI, FEATURE_POLICY_SEARCH, Some(2), 0)
            .await;

        // Duas buscas de pessoas diferentes do mesmo grupo esgotam o teto
        gateway.login(STAFF).await;
        gateway.server.get("/api/policy/documents").await.assert_status_ok();

        gateway.login(MANAGER).await;
        gateway.server.get("/api/policy/documents").await.assert_status_ok();

        gateway.login(STAFF).await;
        let negada = gateway.server.get("/api/policy/documents").await;
        negada.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(negada.json::<Value>()["scopeType"], "group");
    }
}

mod contagem {
    use super::*;

    #[tokio::test]
    async fn sem_quota_aplicavel_a_chamada_passa_sem_contar() {
        let gateway = Gateway::spawn().await;
        gateway.login(STAFF).await;

        for _ in 0..3 {
            gateway.server.get("/api/policy/documents").await.assert_status_ok();
        }
    }

    #[tokio::test]
    async fn a_ultima_unidade_admite_e_a_seguinte_nega() {
        let gateway = Gateway::spawn().await;
        let staff_scope = gateway.staff_id.to_string();
        let quota_id = gateway
            .seed_quota(QuotaScope::User, &staff_scope, FEATURE_POLICY_SEARCH, Some(3), 0)
            .await;

        gateway.login(STAFF).await;
        for _ in 0..3 {
            gateway.server.get("/api/policy/documents").await.assert_status_ok();
        }

        let negada = gateway.server.get("/api/policy/documents").await;
        negada.assert_status(StatusCode::FORBIDDEN);

        // A recusa não consome: o contador parou exatamente no limite
        let quota = gateway.quotas.get(quota_id).await.unwrap().unwrap();
        assert_eq!(quota.used_count, 3);
    }

    #[tokio::test]
    async fn recusa_de_quota_nao_conta_como_uso() {
        let gateway = Gateway::spawn().await;
        let staff_scope = gateway.staff_id.to_string();
        let quota_id = gateway
            .seed_quota(QuotaScope::User, &staff_scope, FEATURE_POLICY_SEARCH, Some(1), 1)
            .await;

        gateway.login(STAFF).await;
        for _ in 0..4 {
            gateway
                .server
                .get("/api/policy/documents")
                .await
                .assert_status(StatusCode::FORBIDDEN);
        }

        let quota = gateway.quotas.get(quota_id).await.unwrap().unwrap();
        assert_eq!(quota.used_count, 1);
    }
}

mod administracao {
    use super::*;

    #[tokio::test]
    async fn console_cria_o_teto_e_o_gateway_passa_a_cobrar() {
        let gateway = Gateway::spawn().await;
        let staff_scope = gateway.staff_id.to_string();

        gateway.login(OWNER).await;
        let criada = gateway
            .server
            .post("/api/admin/quotas")
            .json(&json!({
                "tenantId": TENANT_SUL,
                "scopeType": "user",
                "scopeId": staff_scope,
                "featureKey": FEATURE_POLICY_SEARCH,
                "limit": 1
            }))
            .await;
        criada.assert_status(StatusCode::CREATED);
        let quota_id = criada.json::<Value>()["id"].as_str().unwrap().to_string();

        gateway.login(STAFF).await;
        gateway.server.get("/api/policy/documents").await.assert_status_ok();
        gateway
            .server
            .get("/api/policy/documents")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        // O console sobe o limite; o consumo já contado é preservado
        gateway.login(OWNER).await;
        let ampliada = gateway
            .server
            .put(&format!("/api/admin/quotas/{quota_id}"))
            .json(&json!({ "limit": 5 }))
            .await;
        ampliada.assert_status_ok();
        assert_eq!(ampliada.json::<Value>()["used"], 1);

        gateway.login(STAFF).await;
        gateway.server.get("/api/policy/documents").await.assert_status_ok();
    }

    #[tokio::test]
    async fn quota_sem_limite_e_sem_vigencia_e_recusada() {
        let gateway = Gateway::spawn().await;
        gateway.login(OWNER).await;

        let response = gateway
            .server
            .post("/api/admin/quotas")
            .json(&json!({
                "tenantId": TENANT_SUL,
                "scopeType": "group",
                "scopeId": GROUP_UTI,
                "featureKey": FEATURE_POLICY_SEARCH
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["error"], "Validation");
        assert!(body["details"].get("limit").is_some());
    }

    #[tokio::test]
    async fn quota_para_tenant_desconhecido_falha_fechada() {
        let gateway = Gateway::spawn().await;
        gateway.login(OWNER).await;

        let response = gateway
            .server
            .post("/api/admin/quotas")
            .json(&json!({
                "tenantId": "hospital-fantasma",
                "scopeType": "group",
                "scopeId": GROUP_UTI,
                "featureKey": FEATURE_POLICY_SEARCH,
                "limit": 10
            }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listagem_do_console_enxerga_o_consumo_corrente() {
        let gateway = Gateway::spawn().await;
        let staff_scope = gateway.staff_id.to_string();
        gateway
            .seed_quota(QuotaScope::User, &staff_scope, FEATURE_POLICY_SEARCH, Some(5), 0)
            .await;

        gateway.login(STAFF).await;
        gateway.server.get("/api/policy/documents").await.assert_status_ok();
        gateway.server.get("/api/policy/documents").await.assert_status_ok();

        gateway.login(OWNER).await;
        let response = gateway
            .server
            .get("/api/admin/quotas")
            .add_query_param("tenantId", TENANT_SUL)
            .await;
        response.assert_status_ok();

        let quotas: Vec<Value> = response.json();
        assert_eq!(quotas.len(), 1);
        assert_eq!(quotas[0]["used"], 2);
        assert_eq!(quotas[0]["limit"], 5);
    }
}
