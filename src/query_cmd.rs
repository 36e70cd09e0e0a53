//! CLI commands that go through the query runtime.
//!
//! Each command starts a [`QueryRuntime`] from config, runs one operation
//! and prints JSON to stdout.

use anyhow::Result;
use serde_json::Value;

use crate::config::Config;
use crate::queue::SearchRequestQueue;
use crate::runtime::QueryRuntime;
use crate::status::announce_readiness;

fn print_rows(rows: &[Value]) -> Result<()> {
    if rows.is_empty() {
        println!("No results.");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(rows)?);
    Ok(())
}

/// `vsearch sql <statement>`
pub async fn run_sql(config: &Config, sql: &str) -> Result<()> {
    let runtime = QueryRuntime::from_config(config);
    let rows = runtime.query_json(sql).await?;
    print_rows(&rows)
}

/// `vsearch fts <text>`
pub async fn run_fts(config: &Config, text: &str, limit: Option<usize>) -> Result<()> {
    let runtime = QueryRuntime::from_config(config);
    let limit = limit.unwrap_or(config.index.result_limit);
    let rows = runtime.text_search(text, limit).await?;
    print_rows(&rows)
}

/// `vsearch similar <text>`
pub async fn run_similar(config: &Config, text: &str, limit: Option<usize>) -> Result<()> {
    let runtime = QueryRuntime::from_config(config);
    let limit = limit.unwrap_or(config.index.result_limit);
    let rows = runtime.semantic_search(text, limit).await?;
    if rows.is_empty() && !config.embedding.is_enabled() {
        eprintln!("Semantic search needs an [embedding] provider in config.");
    }
    print_rows(&rows)
}

/// `vsearch embed <text>`
pub async fn run_embed(config: &Config, text: &str) -> Result<()> {
    let runtime = QueryRuntime::from_config(config);
    let vector = runtime.get_embeddings(text).await;
    println!("{}", serde_json::to_string(&vector)?);
    Ok(())
}

/// `vsearch status`: print status events as the engine starts.
pub async fn run_status(config: &Config) -> Result<()> {
    let runtime = QueryRuntime::from_config(config);
    let queue = SearchRequestQueue::new(config.queue.delay());
    let mut events = queue.subscribe();

    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("{}", event.text);
        }
    });

    announce_readiness(&runtime, &queue).await;
    queue.wait_idle().await;
    drop(queue);
    printer.await?;
    Ok(())
}
