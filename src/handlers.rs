// src/handlers.rs

pub mod audit;
pub mod auth;
pub mod policy;
pub mod quotas;
pub mod tenancy;
