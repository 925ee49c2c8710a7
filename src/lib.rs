//! Skillbridge: career-guidance service backend.
//!
//! The interesting part lives in [`cache`]: a coordination layer between the
//! HTTP handlers and the relational aggregations, backed by a shared
//! key-value store. See the module docs there for the moving pieces.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
