// src/handlers/auth.rs

use axum::{Json, extract::State, http::HeaderMap};
use axum_extra::extract::CookieJar;
use serde_json::json;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::guard::{AnySession, Guarded, resolve_permissions},
    middleware::session::{
        AUTH_COOKIE, REFRESH_COOKIE, auth_cookie, clear_auth_cookie, clear_refresh_cookie,
        refresh_cookie,
    },
    models::audit::AuditEvent,
    models::auth::{
        AuthResponse, ChangePasswordPayload, LoginPayload, SwitchTenantPayload, UserProfile,
    },
    models::tenancy::PLATFORM_TENANT,
    services::token::IssuedTokens,
};

// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Sessão criada; tokens gravados nos cookies", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<LoginPayload>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok());

    let issued = match app_state
        .token_service
        .login(&payload.email, &payload.password, user_agent)
        .await
    {
        Ok(issued) => issued,
        Err(error) => {
            // Recusa também vira trilha, sem detalhar o motivo para fora
            app_state.audit_logger.record(
                AuditEvent::new(PLATFORM_TENANT, "auth.login", "session")
                    .failed("credenciais recusadas")
                    .metadata(json!({ "email": payload.email })),
            );
            return Err(error);
        }
    };

    let IssuedTokens {
        user,
        session,
        access_token,
        refresh_token,
    } = issued;

    app_state.audit_logger.record(
        AuditEvent::new(session.active_tenant_id.clone(), "auth.login", "session")
            .actor(user.id)
            .resource(session.id.to_string()),
    );

    let jar = jar
        .add(auth_cookie(access_token, app_state.cookie_secure))
        .add(refresh_cookie(refresh_token, app_state.cookie_secure));

    let profile = UserProfile {
        id: user.id,
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        role: user.role,
        active_tenant_id: session.active_tenant_id.clone(),
        permissions: resolve_permissions(&user),
    };

    Ok((jar, Json(AuthResponse { user: profile })))
}

// POST /api/auth/refresh
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    responses(
        (status = 200, description = "Tokens rotacionados nos cookies", body = AuthResponse),
        (status = 401, description = "Credencial de renovação inválida")
    )
)]
pub async fn refresh(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .ok_or_else(AppError::invalid_refresh)?;

    let IssuedTokens {
        user,
        session,
        access_token,
        refresh_token,
    } = app_state.token_service.renew(&token).await?;

    let jar = jar
        .add(auth_cookie(access_token, app_state.cookie_secure))
        .add(refresh_cookie(refresh_token, app_state.cookie_secure));

    let profile = UserProfile {
        id: user.id,
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        role: user.role,
        active_tenant_id: session.active_tenant_id.clone(),
        permissions: resolve_permissions(&user),
    };

    Ok((jar, Json(AuthResponse { user: profile })))
}

// POST /api/auth/logout
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Sessão encerrada e cookies limpos"))
)]
pub async fn logout(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    let refresh = jar.get(REFRESH_COOKIE).map(|cookie| cookie.value().to_owned());

    // Se o JWT ainda estiver são, derrubamos a sessão exata; cookie rasgado
    // não impede o logout
    let session_id = jar
        .get(AUTH_COOKIE)
        .and_then(|cookie| {
            app_state
                .token_service
                .verify_access_token(cookie.value())
                .ok()
        })
        .map(|claims| claims.sid);

    app_state
        .token_service
        .logout(refresh.as_deref(), session_id)
        .await?;

    let jar = jar.add(clear_auth_cookie()).add(clear_refresh_cookie());
    Ok((jar, Json(json!({ "message": "Sessão encerrada." }))))
}

// GET /api/users/me
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Perfil da sessão ativa", body = AuthResponse),
        (status = 401, description = "Sessão ausente ou inválida")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_me(guard: Guarded<AnySession>) -> Json<AuthResponse> {
    Json(AuthResponse {
        user: guard.ctx.profile(),
    })
}

// POST /api/auth/change-password
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    tag = "Auth",
    request_body = ChangePasswordPayload,
    responses(
        (status = 200, description = "Senha trocada; todas as sessões derrubadas"),
        (status = 401, description = "Senha atual incorreta")
    ),
    security(("session_cookie" = []))
)]
pub async fn change_password(
    State(app_state): State<AppState>,
    guard: Guarded<AnySession>,
    jar: CookieJar,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    app_state
        .token_service
        .change_password(
            guard.ctx.user_id(),
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    app_state.audit_logger.record(
        AuditEvent::new(guard.ctx.tenant_id.clone(), "auth.change_password", "user")
            .actor(guard.ctx.user_id())
            .resource(guard.ctx.user_id().to_string()),
    );

    // Tudo revogado: o cliente precisa entrar de novo
    let jar = jar.add(clear_auth_cookie()).add(clear_refresh_cookie());
    Ok((jar, Json(json!({ "message": "Senha alterada. Entre novamente." }))))
}

// POST /api/auth/switch-tenant
#[utoipa::path(
    post,
    path = "/api/auth/switch-tenant",
    tag = "Auth",
    request_body = SwitchTenantPayload,
    responses(
        (status = 200, description = "Tenant ativo trocado; novo JWT no cookie", body = AuthResponse),
        (status = 403, description = "Usuário não pertence ao tenant de destino"),
        (status = 404, description = "Tenant desconhecido")
    ),
    security(("session_cookie" = []))
)]
pub async fn switch_tenant(
    State(app_state): State<AppState>,
    guard: Guarded<AnySession>,
    jar: CookieJar,
    Json(payload): Json<SwitchTenantPayload>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let (session, access_token) = app_state
        .token_service
        .switch_tenant(&guard.ctx.session, &guard.ctx.user, &payload.tenant_id)
        .await?;

    app_state.audit_logger.record(
        AuditEvent::new(
            session.active_tenant_id.clone(),
            "auth.switch_tenant",
            "session",
        )
        .actor(guard.ctx.user_id())
        .resource(session.id.to_string()),
    );

    let jar = jar.add(auth_cookie(access_token, app_state.cookie_secure));

    let mut profile = guard.ctx.profile();
    profile.active_tenant_id = session.active_tenant_id.clone();

    Ok((jar, Json(AuthResponse { user: profile })))
}
