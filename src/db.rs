pub mod store;
pub mod router;
pub use router::TenantDbRouter;
pub mod memory;

pub mod user_repo;
pub use user_repo::UserRepository;
pub mod session_repo;
pub use session_repo::{RefreshTokenRepository, SessionRepository};
pub mod tenancy_repo;
pub use tenancy_repo::TenantRepository;
pub mod quota_repo;
pub use quota_repo::QuotaRepository;
pub mod idempotency_repo;
pub use idempotency_repo::IdempotencyRepository;
pub mod audit_repo;
pub use audit_repo::AuditRepository;
pub mod policy_repo;
pub use policy_repo::PolicyDocumentRepository;
