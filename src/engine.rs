//! Query engine abstraction and its SQLite implementation.
//!
//! A [`QueryEngine`] executes SQL and hands rows back as [`EngineRow`]s,
//! converting driver values into [`EngineValue`]s as they are read. An
//! [`EngineLauncher`] builds a ready-to-query engine; the runtime calls it
//! at most once per connection lifetime.
//!
//! # Schema
//!
//! ```text
//! vault(id INTEGER PRIMARY KEY, file_path, title, description,
//!       tags, authors, date, draft BOOLEAN, hiring BOOLEAN, status,
//!       md_content, spr_content, embeddings BLOB)
//! vault_fts USING fts5(<fts_columns>, content='vault', content_rowid='id')
//! ```
//!
//! Every dataset row is imported, eligible or not; `id` is the row's
//! position in the dataset, matching the ids in the static index.
//! `tags` and `authors` are stored as JSON array text and come back as
//! lists. Embeddings are stored as little-endian `f32` blobs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use vault_search_core::embedding::vec_to_blob;
use vault_search_core::rows::{EngineRow, EngineValue};

use crate::config::Config;
use crate::db;
use crate::source::{self, ENGINE_COLUMNS};

/// Columns holding JSON-encoded string lists.
const LIST_COLUMNS: &[&str] = &["tags", "authors"];

/// Something that can run SQL.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Run `sql` with positional `params`, returning every row.
    async fn query(&self, sql: &str, params: &[EngineValue]) -> Result<Vec<EngineRow>>;
}

/// Builds a query engine, importing whatever data it needs.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn QueryEngine>>;
}

/// [`QueryEngine`] over a SQLite pool.
pub struct SqliteEngine {
    pool: SqlitePool,
}

impl SqliteEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryEngine for SqliteEngine {
    async fn query(&self, sql: &str, params: &[EngineValue]) -> Result<Vec<EngineRow>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = match param {
                EngineValue::Null => query.bind(None::<String>),
                EngineValue::Bool(b) => query.bind(*b),
                EngineValue::BigInt(i) => query.bind(*i),
                EngineValue::Double(f) => query.bind(*f),
                EngineValue::Text(s) => query.bind(s.clone()),
                EngineValue::Blob(bytes) => query.bind(bytes.clone()),
                EngineValue::List(_) => query.bind(param.to_json().to_string()),
            };
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Query failed: {}", sql))?;
        rows.iter().map(convert_row).collect()
    }
}

/// Convert a driver row into an [`EngineRow`], keeping column order.
fn convert_row(row: &SqliteRow) -> Result<EngineRow> {
    let mut out = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let raw = row.try_get_raw(i)?;

        let value = if raw.is_null() {
            EngineValue::Null
        } else {
            let declared_bool = column.type_info().name() == "BOOLEAN";
            match raw.type_info().name() {
                "INTEGER" if declared_bool => {
                    EngineValue::Bool(row.try_get_unchecked::<i64, _>(i)? != 0)
                }
                "INTEGER" => EngineValue::BigInt(row.try_get_unchecked::<i64, _>(i)?),
                "REAL" => EngineValue::Double(row.try_get_unchecked::<f64, _>(i)?),
                "BLOB" => EngineValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(i)?),
                _ => {
                    let text = row.try_get_unchecked::<String, _>(i)?;
                    if LIST_COLUMNS.contains(&name.as_str()) {
                        parse_list(&text)
                    } else {
                        EngineValue::Text(text)
                    }
                }
            }
        };
        out.push((name, value));
    }
    Ok(out)
}

fn parse_list(text: &str) -> EngineValue {
    match serde_json::from_str::<Vec<String>>(text) {
        Ok(items) => EngineValue::List(items.into_iter().map(EngineValue::Text).collect()),
        Err(_) => EngineValue::Text(text.to_string()),
    }
}

/// Launches a [`SqliteEngine`] loaded with the vault dataset.
pub struct SqliteLauncher {
    db_path: String,
    dataset: PathBuf,
    fts_columns: Vec<String>,
}

impl SqliteLauncher {
    pub fn new(db_path: impl Into<String>, dataset: impl Into<PathBuf>, fts_columns: Vec<String>) -> Self {
        Self {
            db_path: db_path.into(),
            dataset: dataset.into(),
            fts_columns,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.runtime.db_path.clone(),
            config.dataset_path(),
            config.runtime.fts_columns.clone(),
        )
    }
}

#[async_trait]
impl EngineLauncher for SqliteLauncher {
    async fn launch(&self) -> Result<Arc<dyn QueryEngine>> {
        let pool = db::connect(&self.db_path).await?;
        create_schema(&pool).await?;
        let imported = import_dataset(&pool, self.dataset.clone()).await?;
        create_fts_index(&pool, &self.fts_columns).await?;

        info!(
            dataset = %self.dataset.display(),
            rows = imported,
            "query engine ready"
        );
        Ok(Arc::new(SqliteEngine::new(pool)))
    }
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS vault_fts")
        .execute(pool)
        .await?;
    sqlx::query("DROP TABLE IF EXISTS vault").execute(pool).await?;
    sqlx::query(
        "CREATE TABLE vault (
            id INTEGER PRIMARY KEY,
            file_path TEXT NOT NULL,
            title TEXT,
            description TEXT,
            tags TEXT,
            authors TEXT,
            date TEXT,
            draft BOOLEAN,
            hiring BOOLEAN,
            status TEXT,
            md_content TEXT,
            spr_content TEXT,
            embeddings BLOB
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn import_dataset(pool: &SqlitePool, dataset: PathBuf) -> Result<usize> {
    let records =
        tokio::task::spawn_blocking(move || source::read_source(&dataset, ENGINE_COLUMNS))
            .await??;

    let mut tx = pool.begin().await?;
    for (ordinal, record) in records.iter().enumerate() {
        let embeddings = (!record.embeddings.is_empty()).then(|| vec_to_blob(&record.embeddings));
        sqlx::query(
            "INSERT INTO vault (id, file_path, title, description, tags, authors, date, \
             draft, hiring, status, md_content, spr_content, embeddings) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(ordinal as i64)
        .bind(&record.file_path)
        .bind(&record.title)
        .bind(&record.description)
        .bind(serde_json::to_string(&record.tags)?)
        .bind(serde_json::to_string(&record.authors)?)
        .bind(&record.date)
        .bind(record.draft)
        .bind(record.hiring)
        .bind(&record.status)
        .bind(&record.md_content)
        .bind(&record.spr_content)
        .bind(embeddings)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(records.len())
}

async fn create_fts_index(pool: &SqlitePool, columns: &[String]) -> Result<()> {
    let sql = format!(
        "CREATE VIRTUAL TABLE vault_fts USING fts5({}, content='vault', content_rowid='id')",
        columns.join(", ")
    );
    sqlx::query(&sql)
        .execute(pool)
        .await
        .context("Failed to create full-text index")?;
    sqlx::query("INSERT INTO vault_fts(vault_fts) VALUES('rebuild')")
        .execute(pool)
        .await
        .context("Failed to build full-text index")?;

    debug!(columns = %columns.join(","), "full-text index built");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_engine() -> SqliteEngine {
        let pool = db::connect(db::MEMORY_DB).await.unwrap();
        create_schema(&pool).await.unwrap();
        SqliteEngine::new(pool)
    }

    #[tokio::test]
    async fn test_rows_convert_to_engine_values() {
        let engine = memory_engine().await;
        engine
            .query(
                "INSERT INTO vault (id, file_path, title, tags, draft, embeddings) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                &[
                    EngineValue::BigInt(7),
                    EngineValue::Text("a/b.md".to_string()),
                    EngineValue::Text("Alpha".to_string()),
                    EngineValue::Text("[\"x\",\"y\"]".to_string()),
                    EngineValue::Bool(true),
                    EngineValue::Blob(vec_to_blob(&[1.0])),
                ],
            )
            .await
            .unwrap();

        let rows = engine
            .query(
                "SELECT id, title, tags, draft, hiring, embeddings, 0.5 AS half FROM vault",
                &[],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row[0], ("id".to_string(), EngineValue::BigInt(7)));
        assert_eq!(row[1].1, EngineValue::Text("Alpha".to_string()));
        assert_eq!(
            row[2].1,
            EngineValue::List(vec![
                EngineValue::Text("x".to_string()),
                EngineValue::Text("y".to_string()),
            ])
        );
        assert_eq!(row[3].1, EngineValue::Bool(true));
        assert_eq!(row[4].1, EngineValue::Null);
        assert_eq!(row[5].1, EngineValue::Blob(vec_to_blob(&[1.0])));
        assert_eq!(row[6].1, EngineValue::Double(0.5));
    }

    #[tokio::test]
    async fn test_query_error_propagates() {
        let engine = memory_engine().await;
        let err = engine.query("SELECT * FROM missing_table", &[]).await.unwrap_err();
        assert!(err.to_string().contains("Query failed"));
    }

    #[tokio::test]
    async fn test_launch_missing_dataset_fails() {
        let launcher = SqliteLauncher::new(
            db::MEMORY_DB,
            "/nonexistent/vault.parquet",
            vec!["title".to_string()],
        );
        assert!(launcher.launch().await.is_err());
    }
}
