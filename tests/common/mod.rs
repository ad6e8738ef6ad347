// tests/common/mod.rs

// Utilidades compartilhadas dos testes de integração.
#![allow(dead_code)]

pub mod harness;
