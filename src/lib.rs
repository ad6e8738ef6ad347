// src/lib.rs

// Declaração dos nossos módulos
pub mod app;
pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
