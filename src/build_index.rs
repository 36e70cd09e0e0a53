//! Build the static search index from the columnar vault.
//!
//! Reads the source file, drops ineligible rows, builds the inverted
//! index and writes `{ "index": ..., "documents": [...] }` to the
//! configured output path. A missing source is not an error: the step is
//! logged and skipped so a larger build can carry on.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use vault_search_core::index::SearchIndex;
use vault_search_core::models::{IndexDocument, SourceRecord, StoredDocument};
use vault_search_core::records::{project_documents, ProjectionOptions};

use crate::config::Config;
use crate::source::{self, INDEX_COLUMNS};

/// The file written by [`run_build_index`].
#[derive(Serialize)]
pub struct IndexArtifact {
    pub index: SearchIndex,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<StoredDocument>>,
}

/// What a build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub output: PathBuf,
    pub rows_read: usize,
    pub documents: usize,
}

/// Build the index artifact from already-read records.
pub fn build_artifact(
    records: &[SourceRecord],
    config: &Config,
    include_documents: bool,
) -> Result<IndexArtifact> {
    let opts = ProjectionOptions {
        store_summary: config.index.store_summary,
        store_content: config.index.store_content,
    };
    let docs: Vec<IndexDocument> = project_documents(records, opts);

    let mut index = SearchIndex::new(config.index.index_options());
    index.add_all(&docs)?;

    let documents = include_documents.then(|| docs.iter().map(StoredDocument::from).collect());
    Ok(IndexArtifact { index, documents })
}

/// Read the source, build the index and write it out.
///
/// Returns `Ok(None)` when the source file does not exist.
pub fn run_build_index(
    config: &Config,
    output: Option<&Path>,
    include_documents: bool,
) -> Result<Option<BuildSummary>> {
    let source_path = &config.source.path;
    if !source_path.exists() {
        warn!(
            path = %source_path.display(),
            "source file not found, skipping search index build"
        );
        return Ok(None);
    }

    let mut columns: Vec<&str> = INDEX_COLUMNS.to_vec();
    if config.index.store_summary {
        columns.push("spr_content");
    }
    if config.index.store_content {
        columns.push("md_content");
    }
    let records = source::read_source(source_path, &columns)?;
    let artifact = build_artifact(&records, config, include_documents)?;
    let document_count = artifact.index.document_count();

    let output = output.unwrap_or(&config.index.output);
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string(&artifact)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write search index: {}", output.display()))?;

    info!(
        rows = records.len(),
        documents = document_count,
        output = %output.display(),
        "search index built"
    );

    Ok(Some(BuildSummary {
        output: output.to_path_buf(),
        rows_read: records.len(),
        documents: document_count,
    }))
}

/// Load a built index file back into a searchable index.
pub fn load_index(path: &Path, config: &Config) -> Result<SearchIndex> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read search index: {}", path.display()))?;
    let mut json: serde_json::Value =
        serde_json::from_str(&content).context("Failed to parse search index file")?;
    let index_json = json
        .get_mut("index")
        .map(serde_json::Value::take)
        .context("Search index file has no 'index' key")?;
    SearchIndex::from_json(index_json, config.index.index_options())
}
