//! Query runtime: single-flight engine setup plus text and semantic search.
//!
//! [`ConnectionCell`] owns the engine handle. The first caller starts the
//! launch; everyone who arrives while it is in flight awaits the same
//! shared future, so the launcher runs exactly once. A failed or timed-out
//! launch empties the cell again and the next call retries.
//!
//! ```text
//!            get_or_init()
//!                 │
//!     ┌───────────┼───────────────┐
//!     ▼           ▼               ▼
//!   Ready      Pending          Empty
//!  (return)  (await shared)  (start launch → Pending)
//!                 │
//!          Ok ──► Ready    Err ──► Empty
//! ```

use anyhow::{anyhow, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};

use vault_search_core::embedding::{blob_to_vec, cosine_similarity};
use vault_search_core::rows::{column, serialize_rows, EngineRow, EngineValue};
use vault_search_core::text::tokenize;

use crate::config::Config;
use crate::embedding::EmbeddingPipeline;
use crate::engine::{EngineLauncher, QueryEngine, SqliteLauncher};

type SharedOutcome = Result<Arc<dyn QueryEngine>, Arc<anyhow::Error>>;
type PendingLaunch = Shared<BoxFuture<'static, SharedOutcome>>;

enum CellState {
    Empty,
    Pending {
        generation: u64,
        launch: PendingLaunch,
    },
    Ready(Arc<dyn QueryEngine>),
}

struct CellInner {
    state: CellState,
    generation: u64,
}

/// Lazily launched, shared query engine handle.
pub struct ConnectionCell {
    launcher: Arc<dyn EngineLauncher>,
    timeout: Option<Duration>,
    inner: Mutex<CellInner>,
}

impl ConnectionCell {
    pub fn new(launcher: Arc<dyn EngineLauncher>, timeout: Option<Duration>) -> Self {
        Self {
            launcher,
            timeout,
            inner: Mutex::new(CellInner {
                state: CellState::Empty,
                generation: 0,
            }),
        }
    }

    /// Return the engine, launching it if nobody has yet.
    pub async fn get_or_init(&self) -> Result<Arc<dyn QueryEngine>> {
        let (generation, launch) = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            match &inner.state {
                CellState::Ready(engine) => return Ok(Arc::clone(engine)),
                CellState::Pending { generation, launch } => (*generation, launch.clone()),
                CellState::Empty => {
                    inner.generation += 1;
                    let generation = inner.generation;
                    let launch = self.start_launch();
                    inner.state = CellState::Pending {
                        generation,
                        launch: launch.clone(),
                    };
                    (generation, launch)
                }
            }
        };

        let outcome = launch.await;

        let mut inner = self.inner.lock().await;
        let still_pending = matches!(
            &inner.state,
            CellState::Pending { generation: current, .. } if *current == generation
        );
        if still_pending {
            inner.state = match &outcome {
                Ok(engine) => CellState::Ready(Arc::clone(engine)),
                Err(_) => CellState::Empty,
            };
        }

        outcome.map_err(|e| anyhow!("Query engine setup failed: {:#}", e))
    }

    fn start_launch(&self) -> PendingLaunch {
        let launcher = Arc::clone(&self.launcher);
        let timeout = self.timeout;

        async move {
            let result = match timeout {
                Some(limit) => match tokio::time::timeout(limit, launcher.launch()).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!("timed out after {}s", limit.as_secs_f64())),
                },
                None => launcher.launch().await,
            };
            if let Err(e) = &result {
                error!(error = %format!("{:#}", e), "query engine setup failed");
            }
            result.map_err(Arc::new)
        }
        .boxed()
        .shared()
    }

    /// Whether an engine is ready without waiting.
    pub async fn is_ready(&self) -> bool {
        matches!(self.inner.lock().await.state, CellState::Ready(_))
    }

    /// Forget the engine (or in-flight launch). The next call launches anew.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = CellState::Empty;
    }
}

/// Query access to the vault: SQL, full-text search and semantic search.
pub struct QueryRuntime {
    cell: ConnectionCell,
    pipeline: EmbeddingPipeline,
}

impl QueryRuntime {
    pub fn new(
        launcher: Arc<dyn EngineLauncher>,
        pipeline: EmbeddingPipeline,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            cell: ConnectionCell::new(launcher, timeout),
            pipeline,
        }
    }

    /// Runtime backed by the SQLite engine and the configured embedder.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(SqliteLauncher::from_config(config)),
            EmbeddingPipeline::new(config.embedding.clone()),
            config.runtime.connect_timeout(),
        )
    }

    pub async fn get_connection(&self) -> Result<Arc<dyn QueryEngine>> {
        self.cell.get_or_init().await
    }

    pub async fn is_ready(&self) -> bool {
        self.cell.is_ready().await
    }

    /// Run `sql`, waiting for the engine if it is still starting.
    pub async fn query(&self, sql: &str) -> Result<Vec<EngineRow>> {
        self.query_with(sql, &[]).await
    }

    pub async fn query_with(&self, sql: &str, params: &[EngineValue]) -> Result<Vec<EngineRow>> {
        let engine = self.get_connection().await?;
        engine.query(sql, params).await
    }

    /// Run `sql` and return JSON-safe rows.
    pub async fn query_json(&self, sql: &str) -> Result<Vec<Value>> {
        Ok(serialize_rows(&self.query(sql).await?))
    }

    /// Full-text search over the FTS columns, best match first.
    ///
    /// Each query token is quoted and the tokens are ORed, so FTS5 syntax
    /// in user input is matched literally.
    pub async fn text_search(&self, text: &str, limit: usize) -> Result<Vec<Value>> {
        let Some(expr) = fts_match_expression(text) else {
            return Ok(Vec::new());
        };
        let rows = self
            .query_with(
                "SELECT v.id, v.file_path, v.title, v.description, v.tags, v.authors, v.date, \
                 bm25(vault_fts) AS score \
                 FROM vault_fts JOIN vault v ON v.id = vault_fts.rowid \
                 WHERE vault_fts MATCH ? \
                 ORDER BY score, v.id \
                 LIMIT ?",
                &[EngineValue::Text(expr), EngineValue::BigInt(limit as i64)],
            )
            .await?;
        Ok(serialize_rows(&rows))
    }

    /// Embedding for `text`, or empty when semantic search is unavailable.
    pub async fn get_embeddings(&self, text: &str) -> Vec<f32> {
        self.pipeline.embed(text).await
    }

    /// Documents ranked by cosine similarity to the embedding of `text`.
    ///
    /// Returns no rows when no embedding could be computed.
    pub async fn semantic_search(&self, text: &str, limit: usize) -> Result<Vec<Value>> {
        let query_vec = self.get_embeddings(text).await;
        if query_vec.is_empty() {
            debug!("no query embedding, skipping semantic search");
            return Ok(Vec::new());
        }

        let rows = self
            .query(
                "SELECT id, file_path, title, description, tags, authors, date, embeddings \
                 FROM vault WHERE embeddings IS NOT NULL",
            )
            .await?;

        let mut scored: Vec<(f32, EngineRow)> = rows
            .into_iter()
            .filter_map(|mut row| {
                let score = match column(&row, "embeddings") {
                    Some(EngineValue::Blob(blob)) => cosine_similarity(&query_vec, &blob_to_vec(blob)),
                    _ => return None,
                };
                row.retain(|(name, _)| name != "embeddings");
                row.push(("score".to_string(), EngineValue::Double(score as f64)));
                Some((score, row))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let rows: Vec<EngineRow> = scored.into_iter().map(|(_, row)| row).collect();
        Ok(serialize_rows(&rows))
    }

    /// Drop the engine so the next call launches a fresh one.
    pub async fn reset(&self) {
        self.cell.reset().await;
    }
}

/// FTS5 expression matching any token of `text`, or `None` if it has none.
fn fts_match_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = tokenize(text)
        .into_iter()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" OR "))
}
