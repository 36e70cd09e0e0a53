//! # Vault Search
//!
//! Search-index builder and query runtime for a columnar knowledge-base
//! vault.
//!
//! The vault is a parquet file with one row per page (`file_path`,
//! `title`, `description`, `tags`, `authors`, `date`, `draft`, `hiring`,
//! `status`, plus optional content and embedding columns). Vault Search
//! turns it into two things:
//!
//! - a static, self-contained JSON search index for the browser, built
//!   once per site build;
//! - a query runtime that loads the same vault into SQLite with FTS5 and
//!   answers SQL, full-text and embedding-based queries.
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──────────────┐   ┌─────────────────────┐
//!                 ┌───▶│ build_index  │──▶│ search-index.json   │
//! ┌────────────┐  │    └──────────────┘   └─────────────────────┘
//! │  vault     │──┤
//! │ (parquet)  │  │    ┌──────────────┐   ┌──────────┐  ┌─────────┐
//! └────────────┘  └───▶│   engine     │──▶│ runtime  │─▶│  queue  │─▶ status events
//!                      │ SQLite+FTS5  │   │ (single  │  └─────────┘
//!                      └──────────────┘   │  flight) │◀── embedding pipeline
//!                                         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vsearch build-index                 # write the static index
//! vsearch search "deployment tag:ops" # query the static index
//! vsearch fts "deployment"            # full-text query via SQLite
//! vsearch status                      # print readiness events
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`source`] | Parquet reader with column projection |
//! | [`build_index`] | Static search index build |
//! | [`search`] | CLI search over the built index |
//! | [`db`] | SQLite connection |
//! | [`engine`] | Query engine traits and the SQLite engine |
//! | [`runtime`] | Single-flight connection and query operations |
//! | [`embedding`] | Embedding providers and pipeline |
//! | [`queue`] | Serialized status event dispatch |
//! | [`status`] | Readiness announcements |
//! | [`query_cmd`] | CLI commands backed by the runtime |

pub mod build_index;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod query_cmd;
pub mod queue;
pub mod runtime;
pub mod search;
pub mod source;
pub mod status;
