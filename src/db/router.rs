// src/db/router.rs

// Roteador de partições físicas. Tabelas globais (usuários, diretório de
// tenants, contratos, sessões, quotas, auditoria) vivem na partição da
// plataforma; tabelas de negócio vivem na partição do tenant, um schema
// Postgres derivado do `db_name` do registro no diretório. O mapeamento é
// resolvido e cacheado aqui, nunca fixado em código.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tokio::sync::RwLock;

use crate::common::AppError;
use crate::models::tenancy::{PLATFORM_TENANT, PlatformKey, TenantStatus};

// Migrações da partição de tenant, rodadas a cada provisionamento
pub static TENANT_MIGRATOR: Migrator = sqlx::migrate!("./migrations_tenant");

#[derive(Clone)]
pub struct TenantDbRouter {
    platform_pool: PgPool,
    connect_opts: PgConnectOptions,
    pools: Arc<RwLock<HashMap<String, PgPool>>>,

    // Cache tenant_id -> db_name; o db_name nunca muda depois do
    // provisionamento, então só a primeira resolução toca o diretório
    mappings: Arc<RwLock<HashMap<String, String>>>,

    // Flag de compatibilidade, temporária: leituras de tabelas anteriores ao
    // particionamento estrito também casam linhas sem carimbo de tenant.
    // Remover junto com o backfill.
    legacy_untagged_reads: bool,
}

impl TenantDbRouter {
    pub fn new(platform_pool: PgPool, connect_opts: PgConnectOptions, legacy_untagged_reads: bool) -> Self {
        Self {
            platform_pool,
            connect_opts,
            pools: Arc::new(RwLock::new(HashMap::new())),
            mappings: Arc::new(RwLock::new(HashMap::new())),
            legacy_untagged_reads,
        }
    }

    // Partição compartilhada da plataforma
    pub fn platform(&self) -> &PgPool {
        &self.platform_pool
    }

    pub fn untagged_fallback(&self) -> bool {
        self.legacy_untagged_reads
    }

    // Pool da partição do tenant, pinado no schema via search_path. O pool é
    // criado de forma preguiçosa na primeira vez e cacheado pelo db_name.
    pub async fn partition_pool(&self, db_name: &str) -> Result<PgPool, AppError> {
        validate_partition_name(db_name)?;

        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(db_name) {
                return Ok(pool.clone());
            }
        }

        let mut pools = self.pools.write().await;
        // Outra task pode ter criado o pool enquanto esperávamos o write lock
        if let Some(pool) = pools.get(db_name) {
            return Ok(pool.clone());
        }

        let opts = self
            .connect_opts
            .clone()
            .options([("search_path", db_name)]);
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy_with(opts);

        pools.insert(db_name.to_string(), pool.clone());
        Ok(pool)
    }

    // Resolve tenant_id -> partição pelo diretório. Tenant desconhecido ou
    // arquivado falha FECHADO (404); bloqueado falha com 403. Nunca cai em
    // consulta sem escopo.
    pub async fn tenant_partition(&self, tenant_id: &str) -> Result<PgPool, AppError> {
        if tenant_id == PLATFORM_TENANT {
            // O sentinela do console não tem partição física
            return Err(AppError::tenant_not_found());
        }

        {
            let mappings = self.mappings.read().await;
            if let Some(db_name) = mappings.get(tenant_id) {
                return self.partition_pool(db_name).await;
            }
        }

        let row = sqlx::query_as::<_, (String, TenantStatus)>(
            "SELECT db_name, status FROM tenants WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.platform_pool)
        .await?;

        let (db_name, status) = row.ok_or_else(AppError::tenant_not_found)?;
        match status {
            TenantStatus::Active => {}
            TenantStatus::Blocked => return Err(AppError::tenant_blocked()),
            TenantStatus::Archived => return Err(AppError::tenant_not_found()),
        }

        self.mappings
            .write()
            .await
            .insert(tenant_id.to_string(), db_name.clone());
        self.partition_pool(&db_name).await
    }

    // Cria o schema da partição e roda as migrações de tenant nele.
    // Chamado uma vez, no provisionamento.
    pub async fn create_partition(&self, db_name: &str) -> Result<(), AppError> {
        validate_partition_name(db_name)?;

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{db_name}\""))
            .execute(&self.platform_pool)
            .await?;

        let pool = self.partition_pool(db_name).await?;
        TENANT_MIGRATOR.run(&pool).await?;

        tracing::info!("🗄️  Partição '{}' criada e migrada", db_name);
        Ok(())
    }
}

// Seam para o provisionamento físico: o serviço de tenancy depende do trait,
// não do roteador, e os testes trocam por uma implementação vazia.
#[async_trait::async_trait]
pub trait PartitionProvisioner: Send + Sync {
    async fn provision(&self, db_name: &str) -> Result<(), AppError>;
}

#[async_trait::async_trait]
impl PartitionProvisioner for TenantDbRouter {
    async fn provision(&self, db_name: &str) -> Result<(), AppError> {
        self.create_partition(db_name).await
    }
}

// Deriva o nome da partição a partir da chave do tenant. Determinístico e
// sempre dentro do alfabeto seguro de identificadores.
pub fn partition_name_for(tenant_key: &str) -> String {
    let sanitized: String = tenant_key
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("t_{sanitized}")
}

// Identificador de schema vindo do diretório ainda passa por validação
// antes de entrar em SQL: só minúsculas, dígitos e underscore.
pub fn validate_partition_name(name: &str) -> Result<(), AppError> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name.chars().next().is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(AppError::InternalServerError(anyhow::anyhow!(
            "nome de partição inválido: {name:?}"
        )))
    }
}

// Namespace de módulo dentro da partição: dois módulos nunca colidem de
// tabela porque cada um prefixa as suas com a própria chave.
pub fn scoped_table(platform_key: PlatformKey, base: &str) -> String {
    format!("{}_{}", platform_key.as_str(), base)
}

// Filtro dual de leitura para tabelas anteriores ao particionamento: casa o
// tenant atual OU linhas sem carimbo (NULL/vazio). Toda ESCRITA carimba o
// tenant sem ambiguidade; o modo dual existe só para leitura transicional.
pub fn tenant_read_filter(column: &str, bind_index: usize, include_untagged: bool) -> String {
    if include_untagged {
        format!("({column} = ${bind_index} OR {column} IS NULL OR {column} = '')")
    } else {
        format!("{column} = ${bind_index}")
    }
}
