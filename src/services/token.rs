// src/services/token.rs

// Emissão e ciclo de vida dos tokens. O de acesso é um JWT curto com a
// sessão embutida; o de renovação é opaco, vive 30 dias e só existe no banco
// como digest SHA-256. Renovar ROTACIONA: a credencial usada é revogada no
// mesmo passo e nunca vale duas vezes.

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    common::error::{AppError, ForbiddenReason},
    db::store::{RefreshTokenStore, SessionStore, TenantStore, UserStore},
    models::auth::{Claims, RefreshCredential, Session, User},
    models::tenancy::{Entitlements, PLATFORM_TENANT, TenantStatus},
};

const ACCESS_TTL_HOURS: i64 = 1;
const REFRESH_TTL_DAYS: i64 = 30;

// A sessão vive o mesmo que a credencial de renovação; o JWT curto é
// reemitido dentro dessa janela
const SESSION_TTL_DAYS: i64 = 30;

// Digest hex do token de renovação; é a única forma que toca o banco
pub fn hash_refresh_token(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

// Desfecho de login/renovação. Os tokens viajam apenas em cookies; o corpo
// da resposta leva só o perfil.
pub struct IssuedTokens {
    pub user: User,
    pub session: Session,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    tenants: Arc<dyn TenantStore>,
    jwt_secret: String,
}

impl TokenService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        tenants: Arc<dyn TenantStore>,
        jwt_secret: String,
    ) -> Self {
        Self {
            users,
            sessions,
            refresh_tokens,
            tenants,
            jwt_secret,
        }
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        user_agent: Option<&str>,
    ) -> Result<IssuedTokens, AppError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        // Conta desativada responde igual a senha errada: nada de enumeração
        if !user.is_active {
            return Err(AppError::InvalidCredentials);
        }

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid =
            tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        let active_tenant_id = if user.role.is_platform() {
            PLATFORM_TENANT.to_string()
        } else {
            user.default_tenant_id.clone().ok_or_else(|| {
                AppError::InternalServerError(anyhow::anyhow!(
                    "usuário {} sem tenant padrão",
                    user.id
                ))
            })?
        };

        // Tenant bloqueado ou inexistente barra o login aqui mesmo, fechado
        let entitlements = self.entitlements_for(&active_tenant_id).await?;

        // Sessão única por usuário: a anterior morre no login
        self.sessions.delete_for_user(user.id).await?;

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: user.id,
            active_tenant_id,
            role: user.role,
            issued_at: now,
            expires_at: now + Duration::days(SESSION_TTL_DAYS),
        };
        self.sessions.insert(&session).await?;

        let refresh_token = self.issue_refresh_credential(user.id, user_agent).await?;
        let access_token = self.create_access_token(&session, entitlements)?;

        tracing::info!(
            "🔑 Login de {} (tenant ativo: {})",
            user.email,
            session.active_tenant_id
        );

        Ok(IssuedTokens {
            user,
            session,
            access_token,
            refresh_token,
        })
    }

    // Renovação com rotação. "Não existe", "revogado" e "vencido" saem todos
    // pela mesma porta de invalid_refresh().
    pub async fn renew(&self, refresh_plaintext: &str) -> Result<IssuedTokens, AppError> {
        let digest = hash_refresh_token(refresh_plaintext);
        let credential = self
            .refresh_tokens
            .find_by_hash(&digest)
            .await?
            .ok_or_else(AppError::invalid_refresh)?;

        if credential.revoked {
            return Err(AppError::invalid_refresh());
        }

        let now = Utc::now();
        if credential.expires_at <= now {
            // Limpeza oportunista; a resposta não muda por causa dela
            self.refresh_tokens.delete(credential.id).await?;
            return Err(AppError::invalid_refresh());
        }

        self.refresh_tokens.mark_used(credential.id, now).await?;

        let user = self
            .users
            .find_by_id(credential.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(AppError::invalid_refresh)?;

        // Logout e troca de senha derrubam a sessão; sem sessão viva a
        // credencial não renova nada
        let session = self
            .sessions
            .find_for_user(credential.user_id)
            .await?
            .filter(|s| s.expires_at > now)
            .ok_or_else(AppError::invalid_refresh)?;

        // Rotação: a credencial usada morre antes de a nova nascer
        self.refresh_tokens.revoke(credential.id).await?;
        let refresh_token = self
            .issue_refresh_credential(credential.user_id, credential.user_agent.as_deref())
            .await?;

        let entitlements = self.entitlements_for(&session.active_tenant_id).await?;
        let access_token = self.create_access_token(&session, entitlements)?;

        Ok(IssuedTokens {
            user,
            session,
            access_token,
            refresh_token,
        })
    }

    // Logout é idempotente: credencial desconhecida ou sessão já morta não
    // mudam a resposta
    pub async fn logout(
        &self,
        refresh_plaintext: Option<&str>,
        session_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        if let Some(plaintext) = refresh_plaintext {
            let digest = hash_refresh_token(plaintext);
            if let Some(credential) = self.refresh_tokens.find_by_hash(&digest).await? {
                self.refresh_tokens.revoke(credential.id).await?;
            }
        }

        if let Some(id) = session_id {
            self.sessions.delete(id).await?;
        }

        Ok(())
    }

    // Derruba TODAS as credenciais e sessões do usuário (troca de senha,
    // desligamento, incidente)
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<(), AppError> {
        let revoked = self.refresh_tokens.revoke_all_for_user(user_id).await?;
        let dropped = self.sessions.delete_for_user(user_id).await?;
        tracing::info!(
            "🚪 Usuário {}: {} credenciais revogadas, {} sessões derrubadas",
            user_id,
            revoked,
            dropped
        );
        Ok(())
    }

    // Varredura periódica do main; a renovação também limpa o que encontra
    pub async fn sweep_expired(&self) -> Result<(), AppError> {
        let now = Utc::now();
        let sessions = self.sessions.purge_expired(now).await?;
        let credentials = self.refresh_tokens.purge_expired(now).await?;
        if sessions > 0 || credentials > 0 {
            tracing::info!(
                "🧹 Varredura: {} sessões e {} credenciais vencidas removidas",
                sessions,
                credentials
            );
        }
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let current_clone = current_password.to_owned();
        let hash_clone = user.password_hash.clone();
        let is_current_valid =
            tokio::task::spawn_blocking(move || verify(&current_clone, &hash_clone))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_current_valid {
            return Err(AppError::InvalidCredentials);
        }

        let new_clone = new_password.to_owned();
        let new_hash = tokio::task::spawn_blocking(move || hash(&new_clone, bcrypt::DEFAULT_COST))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        self.users.update_password(user_id, &new_hash).await?;

        // Toda credencial viva morre junto com a senha antiga
        self.revoke_all_for_user(user_id).await?;

        tracing::info!("🔐 Senha trocada para o usuário {}", user_id);
        Ok(())
    }

    // Troca o tenant ativo da sessão e reemite o JWT com os entitlements do
    // destino. O tenant da requisição continua vindo SÓ da sessão.
    pub async fn switch_tenant(
        &self,
        session: &Session,
        user: &User,
        target_tenant_id: &str,
    ) -> Result<(Session, String), AppError> {
        // Existência e status primeiro: desconhecido é 404, bloqueado é 403
        let entitlements = self.entitlements_for(target_tenant_id).await?;

        if target_tenant_id == PLATFORM_TENANT {
            if !user.role.is_platform() {
                return Err(AppError::forbidden_role());
            }
        } else if !user.role.is_platform()
            && !self.tenants.is_member(user.id, target_tenant_id).await?
        {
            return Err(AppError::Forbidden {
                reason: ForbiddenReason::Role,
                message: "Você não pertence a este tenant.".to_string(),
            });
        }

        let updated = self
            .sessions
            .set_active_tenant(session.id, target_tenant_id)
            .await?
            .ok_or_else(AppError::no_session)?;

        let access_token = self.create_access_token(&updated, entitlements)?;

        tracing::info!(
            "🔁 Sessão {} trocou para o tenant '{}'",
            updated.id,
            target_tenant_id
        );

        Ok((updated, access_token))
    }

    // Qualquer defeito do token (assinatura, expiração, formato) vira o
    // MESMO 401 de sessão ausente
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|_| AppError::no_session())?;

        Ok(token_data.claims)
    }

    // Entitlements congelados na emissão; o guard revalida o tenant a cada
    // request no diretório
    async fn entitlements_for(&self, tenant_id: &str) -> Result<Entitlements, AppError> {
        if tenant_id == PLATFORM_TENANT {
            // O console da plataforma não tem contrato nem flags de módulo
            return Ok(Entitlements::default());
        }

        let tenant = self
            .tenants
            .find(tenant_id)
            .await?
            .ok_or_else(AppError::tenant_not_found)?;

        match tenant.status {
            TenantStatus::Active => Ok(tenant.entitlements),
            TenantStatus::Blocked => Err(AppError::tenant_blocked()),
            TenantStatus::Archived => Err(AppError::tenant_not_found()),
        }
    }

    async fn issue_refresh_credential(
        &self,
        user_id: Uuid,
        user_agent: Option<&str>,
    ) -> Result<String, AppError> {
        let plaintext = Uuid::new_v4().to_string();
        let now = Utc::now();

        let credential = RefreshCredential {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_refresh_token(&plaintext),
            expires_at: now + Duration::days(REFRESH_TTL_DAYS),
            created_at: now,
            last_used_at: None,
            revoked: false,
            user_agent: user_agent.map(str::to_owned),
        };
        self.refresh_tokens.insert(&credential).await?;

        // O texto puro sai daqui uma única vez, direto para o cookie
        Ok(plaintext)
    }

    fn create_access_token(
        &self,
        session: &Session,
        entitlements: Entitlements,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(ACCESS_TTL_HOURS);

        let claims = Claims {
            sub: session.user_id,
            sid: session.id,
            tenant: session.active_tenant_id.clone(),
            role: session.role,
            ent: entitlements,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}
