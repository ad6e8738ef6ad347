// tests/auth_flow.rs

// Ciclo de vida da sessão pela API: login, perfil, renovação com rotação,
// logout e troca de senha. Os tokens só existem em cookies HttpOnly.

mod common;

use axum::http::StatusCode;
use axum_extra::extract::cookie::Cookie;
use serde_json::{Value, json};

use common::harness::{Gateway, INACTIVE, OWNER, PASSWORD, STAFF, TENANT_SUL};

mod login {
    use super::*;

    #[tokio::test]
    async fn entrega_o_perfil_e_grava_os_tokens_em_cookies_httponly() {
        let gateway = Gateway::spawn().await;

        let response = gateway
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": STAFF, "password": PASSWORD }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["user"]["email"], STAFF);
        assert_eq!(body["user"]["role"], "staff");
        assert_eq!(body["user"]["activeTenantId"], TENANT_SUL);
        // O corpo nunca carrega token nem hash de senha
        assert!(body["user"].get("accessToken").is_none());
        assert!(body["user"].get("passwordHash").is_none());

        let auth = response.cookie("auth-token");
        assert_eq!(auth.http_only(), Some(true));
        let refresh = response.cookie("refresh-token");
        assert_eq!(refresh.http_only(), Some(true));
        assert_ne!(auth.value(), refresh.value());
    }

    #[tokio::test]
    async fn dona_da_plataforma_entra_direto_no_sentinela() {
        let gateway = Gateway::spawn().await;

        let body = gateway.login(OWNER).await;
        assert_eq!(body["user"]["role"], "platform-owner");
        assert_eq!(body["user"]["activeTenantId"], "platform");
    }

    #[tokio::test]
    async fn senha_errada_e_conta_desativada_respondem_identico() {
        let gateway = Gateway::spawn().await;

        let senha_errada = gateway
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": STAFF, "password": "senha-que-nao-e" }))
            .await;
        senha_errada.assert_status(StatusCode::UNAUTHORIZED);

        let conta_desativada = gateway
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": INACTIVE, "password": PASSWORD }))
            .await;
        conta_desativada.assert_status(StatusCode::UNAUTHORIZED);

        // Mesmo corpo nos dois casos: nada de enumeração de contas
        assert_eq!(senha_errada.json::<Value>(), conta_desativada.json::<Value>());
        assert_eq!(
            senha_errada.json::<Value>()["message"],
            "E-mail ou senha inválidos."
        );
    }
}

mod perfil {
    use super::*;

    #[tokio::test]
    async fn me_reflete_a_sessao_ativa() {
        let gateway = Gateway::spawn().await;
        gateway.login(STAFF).await;

        let response = gateway.server.get("/api/users/me").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["user"]["email"], STAFF);
        assert_eq!(body["user"]["activeTenantId"], TENANT_SUL);
        // Staff nasce com leitura de policy por default de papel
        let permissions = body["user"]["permissions"].as_array().unwrap();
        assert!(permissions.contains(&json!("policy.documents.read")));
        assert!(!permissions.contains(&json!("policy.documents.write")));
    }

    #[tokio::test]
    async fn sem_cookie_responde_401_com_a_mensagem_fixa() {
        let gateway = Gateway::spawn().await;

        let response = gateway.server.get("/api/users/me").await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let body: Value = response.json();
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "Tenant not selected. Please log in again.");
    }

    #[tokio::test]
    async fn jwt_rasgado_responde_o_mesmo_401() {
        let gateway = Gateway::spawn().await;

        let response = gateway
            .server
            .get("/api/users/me")
            .add_cookie(Cookie::new("auth-token", "nem.um.jwt"))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.json::<Value>()["message"],
            "Tenant not selected. Please log in again."
        );
    }
}

mod renovacao {
    use super::*;

    #[tokio::test]
    async fn rotaciona_e_a_credencial_usada_nunca_vale_duas_vezes() {
        let mut gateway = Gateway::spawn().await;

        let login = gateway
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": STAFF, "password": PASSWORD }))
            .await;
        login.assert_status_ok();
        let primeira = login.cookie("refresh-token").value().to_string();

        let renovacao = gateway.server.post("/api/auth/refresh").await;
        renovacao.assert_status_ok();
        let segunda = renovacao.cookie("refresh-token").value().to_string();
        assert_ne!(primeira, segunda);

        // A credencial consumida na rotação está revogada
        gateway.server.clear_cookies();
        let replay = gateway
            .server
            .post("/api/auth/refresh")
            .add_cookie(Cookie::new("refresh-token", primeira))
            .await;
        replay.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(
            replay.json::<Value>()["message"],
            "Credencial de renovação inválida."
        );

        // A nova segue viva
        gateway.server.clear_cookies();
        let valida = gateway
            .server
            .post("/api/auth/refresh")
            .add_cookie(Cookie::new("refresh-token", segunda))
            .await;
        valida.assert_status_ok();
    }

    #[tokio::test]
    async fn sem_cookie_ou_com_credencial_desconhecida_responde_401_unico() {
        let gateway = Gateway::spawn().await;

        let sem_cookie = gateway.server.post("/api/auth/refresh").await;
        sem_cookie.assert_status(StatusCode::UNAUTHORIZED);

        let desconhecida = gateway
            .server
            .post("/api/auth/refresh")
            .add_cookie(Cookie::new("refresh-token", "credencial-inventada"))
            .await;
        desconhecida.assert_status(StatusCode::UNAUTHORIZED);

        assert_eq!(sem_cookie.json::<Value>(), desconhecida.json::<Value>());
    }

    #[tokio::test]
    async fn logout_mata_a_renovacao() {
        let mut gateway = Gateway::spawn().await;

        let login = gateway
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": STAFF, "password": PASSWORD }))
            .await;
        let refresh = login.cookie("refresh-token").value().to_string();

        let logout = gateway.server.post("/api/auth/logout").await;
        logout.assert_status_ok();
        assert_eq!(logout.json::<Value>()["message"], "Sessão encerrada.");

        gateway.server.clear_cookies();
        let tentativa = gateway
            .server
            .post("/api/auth/refresh")
            .add_cookie(Cookie::new("refresh-token", refresh))
            .await;
        tentativa.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_sem_sessao_continua_200() {
        let gateway = Gateway::spawn().await;

        let response = gateway.server.post("/api/auth/logout").await;
        response.assert_status_ok();
    }
}

mod troca_de_senha {
    use super::*;

    #[tokio::test]
    async fn derruba_todas_as_credenciais_e_exige_novo_login() {
        let mut gateway = Gateway::spawn().await;

        let login = gateway
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": STAFF, "password": PASSWORD }))
            .await;
        let auth_antigo = login.cookie("auth-token").value().to_string();
        let refresh_antigo = login.cookie("refresh-token").value().to_string();

        let troca = gateway
            .server
            .post("/api/auth/change-password")
            .json(&json!({ "currentPassword": PASSWORD, "newPassword": "senha-nova-123" }))
            .await;
        troca.assert_status_ok();
        assert_eq!(
            troca.json::<Value>()["message"],
            "Senha alterada. Entre novamente."
        );

        // O JWT antigo ainda está assinado e no prazo, mas a sessão morreu
        gateway.server.clear_cookies();
        let me = gateway
            .server
            .get("/api/users/me")
            .add_cookie(Cookie::new("auth-token", auth_antigo))
            .await;
        me.assert_status(StatusCode::UNAUTHORIZED);

        let renovacao = gateway
            .server
            .post("/api/auth/refresh")
            .add_cookie(Cookie::new("refresh-token", refresh_antigo))
            .await;
        renovacao.assert_status(StatusCode::UNAUTHORIZED);

        // Senha antiga não entra mais; a nova entra
        let senha_antiga = gateway
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": STAFF, "password": PASSWORD }))
            .await;
        senha_antiga.assert_status(StatusCode::UNAUTHORIZED);

        let senha_nova = gateway
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": STAFF, "password": "senha-nova-123" }))
            .await;
        senha_nova.assert_status_ok();
    }

    #[tokio::test]
    async fn senha_atual_errada_nao_troca_nada() {
        let gateway = Gateway::spawn().await;
        gateway.login(STAFF).await;

        let troca = gateway
            .server
            .post("/api/auth/change-password")
            .json(&json!({ "currentPassword": "chute-errado", "newPassword": "senha-nova-123" }))
            .await;
        troca.assert_status(StatusCode::UNAUTHORIZED);

        // A sessão segue viva e a senha segue a mesma
        gateway.server.get("/api/users/me").await.assert_status_ok();
    }
}
