// tests/common/harness.rs

// Harness dos testes de integração: stores de memória pré-semeados, o
// AppState montado por partes e um TestServer com pote de cookies, que se
// comporta como um navegador (guarda o que o Set-Cookie mandar).

use std::sync::Arc;

use axum_test::TestServer;
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use hospital_gateway::app::build_router;
use hospital_gateway::config::AppState;
use hospital_gateway::db::memory::{
    MemAuditStore, MemIdempotencyStore, MemPolicyDocumentStore, MemQuotaStore,
    MemRefreshTokenStore, MemSessionStore, MemTenantStore, MemUserStore, NoopProvisioner,
};
use hospital_gateway::db::store::{PolicyDocumentStore, QuotaStore, TenantStore};
use hospital_gateway::models::auth::{Role, User};
use hospital_gateway::models::policy::PolicyDocument;
use hospital_gateway::models::quota::{QuotaScope, QuotaStatus, UsageQuota};
use hospital_gateway::models::tenancy::{Entitlements, Tenant, TenantStatus};

pub const JWT_SECRET: &str = "segredo-dos-testes";

// Todos os usuários semeados compartilham a mesma senha
pub const PASSWORD: &str = "senha-forte";

// Custo mínimo do bcrypt; os testes não medem a dureza do hash
const BCRYPT_COST: u32 = 4;

pub const TENANT_SUL: &str = "hospital-sul";
pub const TENANT_NORTE: &str = "clinica-norte";

pub const OWNER: &str = "operacoes@plataforma.br";
pub const ADMIN: &str = "direcao@hospital-sul.br";
pub const MANAGER: &str = "gestao@hospital-sul.br";
pub const STAFF: &str = "medico@hospital-sul.br";
pub const INACTIVE: &str = "desligado@hospital-sul.br";

// O grupo de MANAGER e STAFF, para quotas de escopo grupo
pub const GROUP_UTI: &str = "uti";

pub struct Gateway {
    pub server: TestServer,

    // Handles concretos dos stores, para semear e inspecionar por fora da API
    pub users: Arc<MemUserStore>,
    pub tenants: Arc<MemTenantStore>,
    pub quotas: Arc<MemQuotaStore>,
    pub audits: Arc<MemAuditStore>,
    pub documents: Arc<MemPolicyDocumentStore>,
    pub idempotency: Arc<MemIdempotencyStore>,

    pub owner_id: Uuid,
    pub admin_id: Uuid,
    pub manager_id: Uuid,
    pub staff_id: Uuid,
}

impl Gateway {
    pub async fn spawn() -> Self {
        Self::spawn_with(false).await
    }

    // `untagged_fallback` liga o filtro transicional das leituras de auditoria
    pub async fn spawn_with(untagged_fallback: bool) -> Self {
        let users = Arc::new(MemUserStore::new());
        let sessions = Arc::new(MemSessionStore::new());
        let refresh_tokens = Arc::new(MemRefreshTokenStore::new());
        let tenants = Arc::new(MemTenantStore::new());
        let quotas = Arc::new(MemQuotaStore::new());
        let idempotency = Arc::new(MemIdempotencyStore::new());
        let audits = Arc::new(MemAuditStore::new());
        let documents = Arc::new(MemPolicyDocumentStore::new());

        let app_state = AppState::from_parts(
            users.clone(),
            sessions,
            refresh_tokens,
            tenants.clone(),
            quotas.clone(),
            idempotency.clone(),
            audits.clone(),
            documents.clone(),
            Arc::new(NoopProvisioner),
            None,
            JWT_SECRET.to_string(),
            false,
            untagged_fallback,
        );

        let server = TestServer::builder()
            .save_cookies()
            .build(build_router(app_state))
            .unwrap();

        let mut gateway = Gateway {
            server,
            users,
            tenants,
            quotas,
            audits,
            documents,
            idempotency,
            owner_id: Uuid::nil(),
            admin_id: Uuid::nil(),
            manager_id: Uuid::nil(),
            staff_id: Uuid::nil(),
        };
        gateway.seed().await;
        gateway
    }

    // Dois tenants com o módulo policy, um time no hospital-sul e a dona da
    // plataforma. MANAGER também pertence à clinica-norte, para os testes de
    // troca de tenant.
    async fn seed(&mut self) {
        let hash = bcrypt::hash(PASSWORD, BCRYPT_COST).unwrap();

        let policy_on = Entitlements {
            policy: true,
            ..Entitlements::default()
        };
        self.tenants
            .insert(&tenant(TENANT_SUL, "Hospital Sul", policy_on))
            .await
            .unwrap();
        self.tenants
            .insert(&tenant(TENANT_NORTE, "Clínica Norte", policy_on))
            .await
            .unwrap();

        let owner = user(OWNER, "Operações da Plataforma", Role::PlatformOwner, None, None, &hash);
        let admin = user(ADMIN, "Direção Hospital Sul", Role::Admin, None, Some(TENANT_SUL), &hash);
        let manager = user(MANAGER, "Gestão da UTI", Role::Manager, Some(GROUP_UTI), Some(TENANT_SUL), &hash);
        let staff = user(STAFF, "Dra. Costa", Role::Staff, Some(GROUP_UTI), Some(TENANT_SUL), &hash);
        let mut inactive = user(INACTIVE, "Conta Desligada", Role::Staff, None, Some(TENANT_SUL), &hash);
        inactive.is_active = false;

        self.owner_id = owner.id;
        self.admin_id = admin.id;
        self.manager_id = manager.id;
        self.staff_id = staff.id;

        for member in [&admin, &manager, &staff, &inactive] {
            self.tenants.add_member(member.id, TENANT_SUL).await.unwrap();
        }
        self.tenants.add_member(manager.id, TENANT_NORTE).await.unwrap();

        for seeded in [owner, admin, manager, staff, inactive] {
            self.users.add(seeded).await;
        }
    }

    // Faz login e devolve o corpo; os tokens ficam no pote de cookies
    pub async fn login(&self, email: &str) -> Value {
        let response = self
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": email, "password": PASSWORD }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()
    }

    pub async fn seed_quota(
        &self,
        scope_type: QuotaScope,
        scope_id: &str,
        feature_key: &str,
        limit: Option<i32>,
        used: i32,
    ) -> Uuid {
        let now = Utc::now();
        let quota = UsageQuota {
            id: Uuid::new_v4(),
            tenant_id: TENANT_SUL.to_string(),
            scope_type,
            scope_id: scope_id.to_string(),
            feature_key: feature_key.to_string(),
            limit_count: limit,
            used_count: used,
            status: QuotaStatus::Active,
            starts_at: Some(now - chrono::Duration::hours(1)),
            ends_at: None,
            locked_at: None,
            created_at: now,
            updated_at: now,
        };
        self.quotas.upsert(&quota).await.unwrap().id
    }

    pub async fn seed_document(&self, tenant_id: &str, title: &str) -> PolicyDocument {
        let now = Utc::now();
        let document = PolicyDocument {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            title: title.to_string(),
            category: None,
            content: "Conteúdo de teste.".to_string(),
            created_by: self.staff_id,
            created_at: now,
            updated_at: now,
        };
        self.documents.insert(&document).await.unwrap();
        document
    }
}

fn tenant(tenant_id: &str, name: &str, entitlements: Entitlements) -> Tenant {
    let now = Utc::now();
    Tenant {
        tenant_id: tenant_id.to_string(),
        name: name.to_string(),
        db_name: format!("t_{}", tenant_id.replace('-', "_")),
        entitlements,
        max_users: 50,
        status: TenantStatus::Active,
        subscription_ends_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn user(
    email: &str,
    display_name: &str,
    role: Role,
    group_id: Option<&str>,
    default_tenant_id: Option<&str>,
    password_hash: &str,
) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        display_name: display_name.to_string(),
        role,
        group_id: group_id.map(str::to_owned),
        permissions: Vec::new(),
        default_tenant_id: default_tenant_id.map(str::to_owned),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
