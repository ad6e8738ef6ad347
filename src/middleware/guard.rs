// src/middleware/guard.rs

// Guardião declarativo das rotas. Cada rota protegida declara sua política
// como um TIPO no extractor (`Guarded<PolicyWrite>`); o pipeline roda na
// ordem fixa sessão, escopo, entitlement, permissão, e cada recusa sai com
// um motivo distinto. O tenant da requisição vem SOMENTE da sessão: header,
// query e corpo não têm voz.

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::session::AUTH_COOKIE,
    models::auth::{Role, Session, User, UserProfile},
    models::tenancy::{PLATFORM_TENANT, PlatformKey, Tenant},
};

/// 1. A política declarada junto do handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteScope {
    // Console da plataforma: exige a sessão no tenant sentinela
    Platform,
    // Dentro de um tenant, com o módulo licenciado
    Tenant(PlatformKey),
    // Qualquer sessão viva
    Any,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteGuard {
    pub scope: RouteScope,
    // Vazio = qualquer papel
    pub roles: &'static [Role],
    // Permissão fina, além do papel
    pub permission: Option<&'static str>,
}

impl RouteGuard {
    pub fn any() -> Self {
        Self {
            scope: RouteScope::Any,
            roles: &[],
            permission: None,
        }
    }

    pub fn platform() -> Self {
        Self {
            scope: RouteScope::Platform,
            roles: &[Role::PlatformOwner],
            permission: None,
        }
    }

    pub fn tenant(platform: PlatformKey) -> Self {
        Self {
            scope: RouteScope::Tenant(platform),
            roles: &[],
            permission: None,
        }
    }

    pub fn with_permission(mut self, permission: &'static str) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn with_roles(mut self, roles: &'static [Role]) -> Self {
        self.roles = roles;
        self
    }
}

/// 2. O Trait que uma rota implementa para se declarar
pub trait RoutePolicy: Send + Sync + 'static {
    fn guard() -> RouteGuard;
}

/// 3. Identidade completa entregue ao handler depois do pipeline
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub session: Session,
    pub tenant_id: String,
    pub role: Role,
    pub permissions: Vec<String>,

    // Registro do diretório; None no sentinela do console
    pub tenant: Option<Tenant>,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn group_id(&self) -> Option<&str> {
        self.user.group_id.as_deref()
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user.id,
            email: self.user.email.clone(),
            display_name: self.user.display_name.clone(),
            role: self.role,
            active_tenant_id: self.tenant_id.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

/// 4. O Extractor (Guardião)
pub struct Guarded<P: RoutePolicy> {
    pub ctx: AuthContext,
    _policy: PhantomData<P>,
}

impl<P, S> FromRequestParts<S> for Guarded<P>
where
    P: RoutePolicy,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let ctx = authenticate(parts, &app_state).await?;
        authorize(&ctx, P::guard())?;

        Ok(Guarded {
            ctx,
            _policy: PhantomData,
        })
    }
}

// Cookie -> JWT -> sessão no banco -> usuário -> tenant revalidado.
// Qualquer defeito até a sessão sai pelo MESMO 401.
async fn authenticate(parts: &Parts, state: &AppState) -> Result<AuthContext, AppError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let token = jar
        .get(AUTH_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .ok_or_else(AppError::no_session)?;

    let claims = state.token_service.verify_access_token(&token)?;

    // A linha viva da sessão é a fonte do tenant ativo; o claim é um eco da
    // emissão e perde para o banco
    let session = state
        .sessions
        .find(claims.sid)
        .await?
        .filter(|s| s.expires_at > Utc::now())
        .ok_or_else(AppError::no_session)?;

    let user = state
        .users
        .find_by_id(session.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(AppError::no_session)?;

    let tenant_id = session.active_tenant_id.clone();

    // Revalidação por request no diretório: bloqueio administrativo vale
    // imediatamente, sem esperar o JWT vencer
    let tenant = if tenant_id == PLATFORM_TENANT {
        None
    } else {
        Some(state.tenancy_service.resolve(&tenant_id).await?)
    };

    let permissions = resolve_permissions(&user);
    let role = user.role;

    Ok(AuthContext {
        user,
        session,
        tenant_id,
        role,
        permissions,
        tenant,
    })
}

// Escopo, papel, entitlement e permissão, nessa ordem
fn authorize(ctx: &AuthContext, guard: RouteGuard) -> Result<(), AppError> {
    match guard.scope {
        RouteScope::Platform => {
            if ctx.tenant_id != PLATFORM_TENANT {
                return Err(AppError::forbidden_role());
            }
        }
        RouteScope::Tenant(platform) => {
            if ctx.tenant_id == PLATFORM_TENANT {
                return Err(AppError::forbidden_role());
            }

            // Entitlement do diretório, não do claim: revogação vale agora
            let enabled = ctx
                .tenant
                .as_ref()
                .is_some_and(|t| t.entitlements.enabled(platform));
            if !enabled {
                return Err(AppError::forbidden_entitlement(platform.as_str()));
            }
        }
        RouteScope::Any => {}
    }

    if !guard.roles.is_empty() && !guard.roles.contains(&ctx.role) {
        return Err(AppError::forbidden_role());
    }

    if let Some(permission) = guard.permission {
        // Administradores passam na checagem fina por definição
        if !ctx.role.is_admin_like() && !ctx.permissions.iter().any(|p| p == permission) {
            return Err(AppError::forbidden_permission(permission));
        }
    }

    Ok(())
}

// ---
// Permissões finas
// ---
pub mod perm {
    pub const POLICY_DOCUMENTS_READ: &str = "policy.documents.read";
    pub const POLICY_DOCUMENTS_WRITE: &str = "policy.documents.write";
}

// Defaults por papel; os grants individuais do usuário somam por cima
fn role_default_permissions(role: Role) -> &'static [&'static str] {
    match role {
        Role::PlatformOwner | Role::Admin => &[],
        Role::Manager => &[perm::POLICY_DOCUMENTS_READ, perm::POLICY_DOCUMENTS_WRITE],
        Role::Staff => &[perm::POLICY_DOCUMENTS_READ],
    }
}

pub fn resolve_permissions(user: &User) -> Vec<String> {
    let mut permissions: Vec<String> = role_default_permissions(user.role)
        .iter()
        .map(|p| (*p).to_string())
        .collect();

    for grant in &user.permissions {
        if !permissions.contains(grant) {
            permissions.push(grant.clone());
        }
    }

    permissions
}

// ---
// POLÍTICAS DAS ROTAS (TIPOS)
// ---

pub struct AnySession;
impl RoutePolicy for AnySession {
    fn guard() -> RouteGuard {
        RouteGuard::any()
    }
}

pub struct PlatformConsole;
impl RoutePolicy for PlatformConsole {
    fn guard() -> RouteGuard {
        RouteGuard::platform()
    }
}

pub struct PolicyRead;
impl RoutePolicy for PolicyRead {
    fn guard() -> RouteGuard {
        RouteGuard::tenant(PlatformKey::Policy).with_permission(perm::POLICY_DOCUMENTS_READ)
    }
}

pub struct PolicyWrite;
impl RoutePolicy for PolicyWrite {
    fn guard() -> RouteGuard {
        RouteGuard::tenant(PlatformKey::Policy).with_permission(perm::POLICY_DOCUMENTS_WRITE)
    }
}
