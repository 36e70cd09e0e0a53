//! `vsearch search`: query the built index file from the command line.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::path::Path;

use vault_search_core::query::{search_documents, ResultDocument};

use crate::build_index::load_index;
use crate::config::Config;

/// Parse the leading `YYYY-MM-DD` of a stored date.
fn document_date(result: &ResultDocument) -> Option<NaiveDate> {
    let raw = result.stored.get("date").and_then(Value::as_str)?;
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Search the index file, optionally keeping only documents dated on or
/// after `since`.
pub fn search_index_file(
    config: &Config,
    index_path: &Path,
    query: &str,
    since: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<ResultDocument>> {
    let index = load_index(index_path, config)?;
    let limit = limit.unwrap_or(config.index.result_limit);

    let since_date = since
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("--since must be YYYY-MM-DD")?;

    // Filter before truncating so `--since` doesn't starve the result list.
    let results = search_documents(&index, query, usize::MAX);
    let mut flat: Vec<ResultDocument> = results
        .flat
        .into_iter()
        .filter(|r| match since_date {
            Some(since) => document_date(r).is_some_and(|d| d >= since),
            None => true,
        })
        .collect();
    flat.truncate(limit);
    Ok(flat)
}

pub fn run_search(
    config: &Config,
    query: &str,
    since: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let results = search_index_file(config, &config.index.output, query, since.as_deref(), limit)?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let field = |name: &str| {
            result
                .stored
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        };
        let title = field("title");
        let category = if result.category.is_empty() {
            "(root)".to_string()
        } else {
            result.category.clone()
        };

        println!("{}. [{:.2}] {} / {}", i + 1, result.score, category, title);
        println!("    path: {}", field("file_path"));
        let date = field("date");
        if !date.is_empty() {
            println!("    date: {}", date);
        }
        println!("    description: \"{}\"", field("description").replace('\n', " ").trim());
        if !result.matching_lines.is_empty() {
            println!("    excerpt: \"{}\"", result.matching_lines);
        }
        println!("    id: {}", result.id);
        println!();
    }

    Ok(())
}
