pub mod auth;
pub mod tenancy;
pub mod quota;
pub mod idempotency;
pub mod audit;
pub mod policy;
