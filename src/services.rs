pub mod token;
pub use token::TokenService;
pub mod tenancy;
pub use tenancy::TenancyService;
pub mod quota;
pub use quota::QuotaService;
pub mod idempotency;
pub use idempotency::IdempotencyService;
pub mod audit;
pub use audit::AuditLogger;
pub mod policy;
pub use policy::PolicyService;
