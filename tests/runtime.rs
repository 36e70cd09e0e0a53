//! Query runtime tests: the SQLite engine over a real vault file, the
//! single-flight connection, and readiness announcements.

mod common;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vault_search::config::{load_config, Config, EmbeddingConfig};
use vault_search::embedding::{Embedder, EmbeddingPipeline};
use vault_search::engine::{EngineLauncher, QueryEngine, SqliteLauncher};
use vault_search::queue::SearchRequestQueue;
use vault_search::runtime::QueryRuntime;
use vault_search::status::{announce_readiness, INITIALIZING, OFFLINE, READY};
use vault_search_core::embedding::EmbeddingProvider;
use vault_search_core::rows::{EngineRow, EngineValue};

use common::{setup_test_env, TestEnv};

fn sqlite_runtime(env: &TestEnv, pipeline: EmbeddingPipeline) -> (Config, QueryRuntime) {
    let config = load_config(&env.config_path).unwrap();
    let runtime = QueryRuntime::new(
        Arc::new(SqliteLauncher::from_config(&config)),
        pipeline,
        config.runtime.connect_timeout(),
    );
    (config, runtime)
}

// ─── Test doubles ───────────────────────────────────────────────────

struct StaticEngine;

#[async_trait]
impl QueryEngine for StaticEngine {
    async fn query(&self, _sql: &str, _params: &[EngineValue]) -> Result<Vec<EngineRow>> {
        Ok(vec![vec![(
            "answer".to_string(),
            EngineValue::BigInt(9_007_199_254_740_993),
        )]])
    }
}

/// Fails its first `failures` launches, then succeeds.
struct FlakyLauncher {
    calls: AtomicUsize,
    failures: usize,
}

#[async_trait]
impl EngineLauncher for FlakyLauncher {
    async fn launch(&self) -> Result<Arc<dyn QueryEngine>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if call < self.failures {
            bail!("dataset unavailable");
        }
        Ok(Arc::new(StaticEngine))
    }
}

struct HangingLauncher;

#[async_trait]
impl EngineLauncher for HangingLauncher {
    async fn launch(&self) -> Result<Arc<dyn QueryEngine>> {
        std::future::pending().await
    }
}

/// Maps texts mentioning "alpha" to the x axis, everything else to y.
struct AxisEmbedder;

impl EmbeddingProvider for AxisEmbedder {
    fn model_name(&self) -> &str {
        "axis"
    }

    fn dims(&self) -> usize {
        3
    }
}

#[async_trait]
impl Embedder for AxisEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                if t.to_lowercase().contains("alpha") {
                    vec![1.0, 0.0, 0.0]
                } else {
                    vec![0.0, 1.0, 0.0]
                }
            })
            .collect())
    }
}

fn enabled_embedding_config() -> EmbeddingConfig {
    EmbeddingConfig {
        provider: "local".to_string(),
        ..Default::default()
    }
}

// ─── SQLite engine over a vault file ────────────────────────────────

#[tokio::test]
async fn test_sqlite_imports_every_row() {
    let env = setup_test_env();
    let (_, runtime) = sqlite_runtime(&env, EmbeddingPipeline::new(Default::default()));

    let rows = runtime
        .query_json("SELECT id, file_path, draft FROM vault ORDER BY id")
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["id"], "0");
    assert_eq!(rows[0]["file_path"], "guides/alpha.md");
    assert_eq!(rows[0]["draft"], false);
    assert_eq!(rows[1]["draft"], true);
    assert!(rows[2]["draft"].is_null());
}

#[tokio::test]
async fn test_sqlite_lists_come_back_as_arrays() {
    let env = setup_test_env();
    let (_, runtime) = sqlite_runtime(&env, EmbeddingPipeline::new(Default::default()));

    let rows = runtime
        .query_json("SELECT tags, authors FROM vault WHERE id = 0")
        .await
        .unwrap();
    assert_eq!(rows[0]["tags"], serde_json::json!(["x"]));
    assert_eq!(rows[0]["authors"], serde_json::json!(["Ann"]));
}

#[tokio::test]
async fn test_text_search_ranks_matches() {
    let env = setup_test_env();
    let (_, runtime) = sqlite_runtime(&env, EmbeddingPipeline::new(Default::default()));

    let rows = runtime.text_search("alpha", 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"], "Alpha Guide");

    let rows = runtime.text_search("deployment", 1).await.unwrap();
    assert_eq!(rows.len(), 1);

    assert!(runtime.text_search("\"", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_text_search_treats_syntax_literally() {
    let env = setup_test_env();
    let (_, runtime) = sqlite_runtime(&env, EmbeddingPipeline::new(Default::default()));

    let rows = runtime.text_search("alpha AND OR NOT", 10).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_parameterized_query() {
    let env = setup_test_env();
    let (_, runtime) = sqlite_runtime(&env, EmbeddingPipeline::new(Default::default()));

    let rows = runtime
        .query_with(
            "SELECT title FROM vault WHERE file_path = ?",
            &[EngineValue::Text("gamma.md".to_string())],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].1, EngineValue::Text("Gamma".to_string()));
}

#[tokio::test]
async fn test_semantic_search_ranks_by_similarity() {
    let env = setup_test_env();
    let pipeline =
        EmbeddingPipeline::with_embedder(enabled_embedding_config(), Arc::new(AxisEmbedder));
    let (_, runtime) = sqlite_runtime(&env, pipeline);

    let rows = runtime.semantic_search("alpha please", 10).await.unwrap();
    // Gamma has no embedding and is skipped.
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["file_path"], "guides/alpha.md");
    assert_eq!(rows[1]["file_path"], "guides/beta.md");
    assert!(rows[0].get("embeddings").is_none());

    let rows = runtime.semantic_search("something else", 1).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["file_path"], "guides/beta.md");
}

#[tokio::test]
async fn test_missing_dataset_fails_setup() {
    let env = setup_test_env();
    std::fs::remove_file(env.vault()).unwrap();
    let (_, runtime) = sqlite_runtime(&env, EmbeddingPipeline::new(Default::default()));

    let err = runtime.query("SELECT 1").await.unwrap_err();
    assert!(err.to_string().contains("Query engine setup failed"));
    assert!(!runtime.is_ready().await);
}

// ─── Single-flight connection ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_concurrent_queries_share_one_launch() {
    let launcher = Arc::new(FlakyLauncher {
        calls: AtomicUsize::new(0),
        failures: 0,
    });
    let runtime = Arc::new(QueryRuntime::new(
        launcher.clone(),
        EmbeddingPipeline::new(Default::default()),
        None,
    ));

    let (a, b, c) = tokio::join!(
        runtime.query_json("a"),
        runtime.query_json("b"),
        runtime.get_connection(),
    );
    assert_eq!(a.unwrap()[0]["answer"], "9007199254740993");
    assert!(b.is_ok());
    assert!(c.is_ok());
    assert_eq!(launcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_launch_is_retried_by_next_caller() {
    let launcher = Arc::new(FlakyLauncher {
        calls: AtomicUsize::new(0),
        failures: 1,
    });
    let runtime = QueryRuntime::new(
        launcher.clone(),
        EmbeddingPipeline::new(Default::default()),
        None,
    );

    // Both waiters of the failed launch see the same error.
    let (first, second) = tokio::join!(runtime.get_connection(), runtime.get_connection());
    let first = first.err().unwrap();
    assert!(format!("{:#}", first).contains("dataset unavailable"));
    assert!(second.is_err());
    assert_eq!(launcher.calls.load(Ordering::SeqCst), 1);

    assert!(runtime.get_connection().await.is_ok());
    assert_eq!(launcher.calls.load(Ordering::SeqCst), 2);
    assert!(runtime.is_ready().await);
}

#[tokio::test(start_paused = true)]
async fn test_launch_times_out() {
    let runtime = QueryRuntime::new(
        Arc::new(HangingLauncher),
        EmbeddingPipeline::new(Default::default()),
        Some(Duration::from_secs(30)),
    );

    let err = runtime.get_connection().await.err().unwrap();
    assert!(err.to_string().contains("timed out"), "got: {:#}", err);
    assert!(!runtime.is_ready().await);
}

#[tokio::test(start_paused = true)]
async fn test_reset_drops_engine() {
    let launcher = Arc::new(FlakyLauncher {
        calls: AtomicUsize::new(0),
        failures: 0,
    });
    let runtime = QueryRuntime::new(
        launcher.clone(),
        EmbeddingPipeline::new(Default::default()),
        None,
    );

    runtime.get_connection().await.unwrap();
    runtime.reset().await;
    assert!(!runtime.is_ready().await);
    runtime.get_connection().await.unwrap();
    assert_eq!(launcher.calls.load(Ordering::SeqCst), 2);
}

// ─── Readiness announcements ────────────────────────────────────────

async fn collect_events(runtime: &QueryRuntime) -> (bool, Vec<String>) {
    let queue = SearchRequestQueue::new(Duration::from_millis(500));
    let mut rx = queue.subscribe();
    let ready = announce_readiness(runtime, &queue).await;
    queue.wait_idle().await;

    let mut texts = Vec::new();
    while let Ok(event) = rx.try_recv() {
        texts.push(event.text);
    }
    (ready, texts)
}

#[tokio::test(start_paused = true)]
async fn test_announce_ready() {
    let runtime = QueryRuntime::new(
        Arc::new(FlakyLauncher {
            calls: AtomicUsize::new(0),
            failures: 0,
        }),
        EmbeddingPipeline::new(Default::default()),
        None,
    );

    let (ready, texts) = collect_events(&runtime).await;
    assert!(ready);
    assert_eq!(texts, vec![INITIALIZING.to_string(), READY.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_announce_offline() {
    let runtime = QueryRuntime::new(
        Arc::new(FlakyLauncher {
            calls: AtomicUsize::new(0),
            failures: 1,
        }),
        EmbeddingPipeline::new(Default::default()),
        None,
    );

    let (ready, texts) = collect_events(&runtime).await;
    assert!(!ready);
    assert_eq!(texts, vec!["Initializing Search...", "Search (Offline)"]);
    assert_eq!(OFFLINE, "Search (Offline)");
}
