//src/main.rs

use std::time::Duration;

use tokio::net::TcpListener;

use hospital_gateway::app::build_router;
use hospital_gateway::config::AppState;

// Intervalo da varredura de sessões, credenciais, chaves idempotentes e
// auditoria vencidas
const MAINTENANCE_INTERVAL_SECS: u64 = 60 * 60;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Migrações da partição da plataforma; as de tenant rodam no provisionamento
    if let Some(router) = &app_state.db_router {
        sqlx::migrate!()
            .run(router.platform())
            .await
            .expect("Falha ao rodar as migrações do banco de dados.");

        tracing::info!("✅ Migrações da partição da plataforma executadas com sucesso!");
    }

    spawn_maintenance(app_state.clone());

    let app = build_router(app_state);

    // Inicia o servidor
    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}

// Task desanexada de manutenção; falha de varredura vira warn e a próxima
// rodada tenta de novo
fn spawn_maintenance(app_state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(MAINTENANCE_INTERVAL_SECS));
        loop {
            ticker.tick().await;

            if let Err(e) = app_state.token_service.sweep_expired().await {
                tracing::warn!("Varredura de sessões e credenciais falhou: {}", e);
            }
            if let Err(e) = app_state.idempotency_service.sweep_retention().await {
                tracing::warn!("Varredura de chaves idempotentes falhou: {}", e);
            }
            if let Err(e) = app_state.audit_logger.sweep_retention().await {
                tracing::warn!("Varredura de auditoria falhou: {}", e);
            }
        }
    });
}
