// src/config.rs

use std::str::FromStr;
use std::{env, sync::Arc, time::Duration};

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::db::{
    AuditRepository, IdempotencyRepository, PolicyDocumentRepository, QuotaRepository,
    RefreshTokenRepository, SessionRepository, TenantDbRouter, TenantRepository, UserRepository,
    memory::{
        MemAuditStore, MemIdempotencyStore, MemPolicyDocumentStore, MemQuotaStore,
        MemRefreshTokenStore, MemSessionStore, MemTenantStore, MemUserStore, NoopProvisioner,
    },
    router::PartitionProvisioner,
    store::{
        AuditStore, IdempotencyStore, PolicyDocumentStore, QuotaStore, RefreshTokenStore,
        SessionStore, TenantStore, UserStore,
    },
};
use crate::services::{
    AuditLogger, IdempotencyService, PolicyService, QuotaService, TenancyService, TokenService,
};

#[derive(Clone)]
pub struct AppState {
    // Stores que o guardião consulta diretamente a cada request
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,

    pub token_service: TokenService,
    pub tenancy_service: TenancyService,
    pub quota_service: QuotaService,
    pub idempotency_service: IdempotencyService,
    pub policy_service: PolicyService,
    pub audit_logger: AuditLogger,

    // Roteador das partições físicas; None quando os stores são de memória
    pub db_router: Option<TenantDbRouter>,

    pub cookie_secure: bool,

    // Flag de compatibilidade das leituras sem carimbo de tenant
    pub untagged_fallback: bool,
}

impl AppState {
    // Produção: Postgres + roteador de partições, tudo vindo do ambiente
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL deve ser definida"))?;
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET deve ser definido"))?;

        let cookie_secure = env_flag("COOKIE_SECURE", true);
        let untagged_fallback = env_flag("TENANT_COMPAT_UNTAGGED_READS", false);
        if untagged_fallback {
            tracing::warn!(
                "⚠️  TENANT_COMPAT_UNTAGGED_READS ligada: leituras casam linhas sem carimbo de tenant"
            );
        }

        let connect_opts = PgConnectOptions::from_str(&database_url)?;
        let platform_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let db_router = TenantDbRouter::new(platform_pool.clone(), connect_opts, untagged_fallback);

        let users: Arc<dyn UserStore> = Arc::new(UserRepository::new(platform_pool.clone()));
        let sessions: Arc<dyn SessionStore> =
            Arc::new(SessionRepository::new(platform_pool.clone()));
        let refresh_tokens: Arc<dyn RefreshTokenStore> =
            Arc::new(RefreshTokenRepository::new(platform_pool.clone()));
        let tenants: Arc<dyn TenantStore> = Arc::new(TenantRepository::new(platform_pool.clone()));
        let quotas: Arc<dyn QuotaStore> = Arc::new(QuotaRepository::new(platform_pool.clone()));
        let audits: Arc<dyn AuditStore> = Arc::new(AuditRepository::new(platform_pool.clone()));
        let idempotency: Arc<dyn IdempotencyStore> =
            Arc::new(IdempotencyRepository::new(db_router.clone()));
        let documents: Arc<dyn PolicyDocumentStore> =
            Arc::new(PolicyDocumentRepository::new(db_router.clone()));

        Ok(Self::from_parts(
            users,
            sessions,
            refresh_tokens,
            tenants,
            quotas,
            idempotency,
            audits,
            documents,
            Arc::new(db_router.clone()),
            Some(db_router),
            jwt_secret,
            cookie_secure,
            untagged_fallback,
        ))
    }

    // Stores de memória: testes de integração e servidores efêmeros. Mesma
    // semântica observável, zero Postgres.
    pub fn with_memory_stores(jwt_secret: &str) -> Self {
        let users: Arc<dyn UserStore> = Arc::new(MemUserStore::new());
        let sessions: Arc<dyn SessionStore> = Arc::new(MemSessionStore::new());
        let refresh_tokens: Arc<dyn RefreshTokenStore> = Arc::new(MemRefreshTokenStore::new());
        let tenants: Arc<dyn TenantStore> = Arc::new(MemTenantStore::new());
        let quotas: Arc<dyn QuotaStore> = Arc::new(MemQuotaStore::new());
        let idempotency: Arc<dyn IdempotencyStore> = Arc::new(MemIdempotencyStore::new());
        let audits: Arc<dyn AuditStore> = Arc::new(MemAuditStore::new());
        let documents: Arc<dyn PolicyDocumentStore> = Arc::new(MemPolicyDocumentStore::new());

        Self::from_parts(
            users,
            sessions,
            refresh_tokens,
            tenants,
            quotas,
            idempotency,
            audits,
            documents,
            Arc::new(NoopProvisioner),
            None,
            jwt_secret.to_string(),
            false,
            false,
        )
    }

    // Ponto único de montagem; os testes de integração passam stores de
    // memória pré-semeados por aqui
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        tenants: Arc<dyn TenantStore>,
        quotas: Arc<dyn QuotaStore>,
        idempotency: Arc<dyn IdempotencyStore>,
        audits: Arc<dyn AuditStore>,
        documents: Arc<dyn PolicyDocumentStore>,
        provisioner: Arc<dyn PartitionProvisioner>,
        db_router: Option<TenantDbRouter>,
        jwt_secret: String,
        cookie_secure: bool,
        untagged_fallback: bool,
    ) -> Self {
        // --- Monta o gráfico de dependências ---
        let token_service = TokenService::new(
            users.clone(),
            sessions.clone(),
            refresh_tokens,
            tenants.clone(),
            jwt_secret,
        );
        let tenancy_service = TenancyService::new(tenants, quotas.clone(), provisioner);
        let quota_service = QuotaService::new(quotas);
        let idempotency_service = IdempotencyService::new(idempotency);
        let policy_service = PolicyService::new(documents);
        let audit_logger = AuditLogger::new(audits);

        Self {
            users,
            sessions,
            token_service,
            tenancy_service,
            quota_service,
            idempotency_service,
            policy_service,
            audit_logger,
            db_router,
            cookie_secure,
            untagged_fallback,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => matches!(value.trim(), "1" | "true" | "TRUE" | "True"),
        Err(_) => default,
    }
}
