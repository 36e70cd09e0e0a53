//! # Vault Search Core
//!
//! Shared, WASM-safe logic for vault-search: the record model,
//! normalization and eligibility rules, the inverted full-text index,
//! query-filter parsing and result grouping, JSON-safe row
//! serialization, and embedding vector utilities.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. It compiles to both native targets and
//! `wasm32-unknown-unknown`.

pub mod embedding;
pub mod index;
pub mod models;
pub mod query;
pub mod records;
pub mod rows;
pub mod segment;
pub mod text;
