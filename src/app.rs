// src/app.rs

// Montagem das rotas. Nenhum middleware de autorização aqui: cada handler
// declara a própria política via Guarded<P>, e o extractor decide.

use axum::{
    Router,
    routing::{get, post, put},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::handlers;

pub fn build_router(app_state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/logout", post(handlers::auth::logout))
        .route("/change-password", post(handlers::auth::change_password))
        .route("/switch-tenant", post(handlers::auth::switch_tenant));

    let user_routes = Router::new().route("/me", get(handlers::auth::get_me));

    let policy_routes = Router::new().route(
        "/documents",
        get(handlers::policy::list_documents).post(handlers::policy::create_document),
    );

    // Console da plataforma; todas exigem o sentinela via Guarded<PlatformConsole>
    let admin_routes = Router::new()
        .route(
            "/tenants",
            post(handlers::tenancy::provision_tenant).get(handlers::tenancy::list_tenants),
        )
        .route(
            "/tenants/{tenant_id}/entitlements",
            put(handlers::tenancy::update_entitlements),
        )
        .route(
            "/quotas",
            post(handlers::quotas::create_quota).get(handlers::quotas::list_quotas),
        )
        .route("/quotas/{id}", put(handlers::quotas::update_quota))
        .route("/audit", get(handlers::audit::list_audit));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/policy", policy_routes)
        .nest("/api/admin", admin_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}
