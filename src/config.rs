//! TOML configuration for the index builder and query runtime.
//!
//! ```toml
//! [source]
//! path = "public/content/vault.parquet"
//!
//! [index]
//! output = "public/content/search-index.json"
//!
//! [index.boost]
//! title = 2.0
//! tags = 1.5
//! authors = 1.2
//!
//! [runtime]
//! connect_timeout_secs = 30
//!
//! [embedding]
//! provider = "disabled"
//!
//! [queue]
//! delay_ms = 500
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vault_search_core::index::{IndexOptions, SearchOptions};

/// Columns of the source dataset that the runtime can index with FTS5.
pub const KNOWN_COLUMNS: &[&str] = &[
    "file_path",
    "title",
    "description",
    "tags",
    "authors",
    "date",
    "status",
    "md_content",
    "spr_content",
];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_true")]
    pub include_documents: bool,
    #[serde(default)]
    pub store_summary: bool,
    /// Keep `md_content` in stored fields so results carry matching lines.
    #[serde(default)]
    pub store_content: bool,
    #[serde(default = "default_fuzzy")]
    pub fuzzy: f64,
    #[serde(default = "default_true")]
    pub prefix: bool,
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(default)]
    pub boost: BoostConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            include_documents: true,
            store_summary: false,
            store_content: false,
            fuzzy: default_fuzzy(),
            prefix: true,
            result_limit: default_result_limit(),
            boost: BoostConfig::default(),
        }
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("public/content/search-index.json")
}
fn default_true() -> bool {
    true
}
fn default_fuzzy() -> f64 {
    0.2
}
fn default_result_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct BoostConfig {
    #[serde(default = "default_title_boost")]
    pub title: f64,
    #[serde(default = "default_tags_boost")]
    pub tags: f64,
    #[serde(default = "default_authors_boost")]
    pub authors: f64,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            title: default_title_boost(),
            tags: default_tags_boost(),
            authors: default_authors_boost(),
        }
    }
}

fn default_title_boost() -> f64 {
    2.0
}
fn default_tags_boost() -> f64 {
    1.5
}
fn default_authors_boost() -> f64 {
    1.2
}

impl IndexConfig {
    /// Index options for building and loading the search index.
    pub fn index_options(&self) -> IndexOptions {
        let mut boost = BTreeMap::new();
        boost.insert("title".to_string(), self.boost.title);
        boost.insert("tags".to_string(), self.boost.tags);
        boost.insert("authors".to_string(), self.boost.authors);

        let mut options = IndexOptions {
            search: SearchOptions {
                boost,
                fuzzy: self.fuzzy,
                prefix: self.prefix,
            },
            ..IndexOptions::default()
        };
        if self.store_summary {
            options.store_fields.push("spr_content".to_string());
        }
        if self.store_content {
            options.store_fields.push("md_content".to_string());
        }
        options
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Dataset imported into the engine. Falls back to `source.path`.
    #[serde(default)]
    pub dataset: Option<PathBuf>,
    #[serde(default = "default_fts_columns")]
    pub fts_columns: Vec<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            dataset: None,
            fts_columns: default_fts_columns(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_db_path() -> String {
    ":memory:".to_string()
}
fn default_fts_columns() -> Vec<String> {
    ["file_path", "title", "md_content", "tags", "authors"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_connect_timeout() -> u64 {
    30
}

impl RuntimeConfig {
    /// Setup timeout, or `None` to wait indefinitely.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible endpoint or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_input_chars() -> usize {
    2000
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_delay_ms() -> u64 {
    500
}

impl QueueConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Config {
    /// Config pointing at `source` with every other section defaulted.
    pub fn for_source(source: impl Into<PathBuf>) -> Self {
        Self {
            source: SourceConfig {
                path: source.into(),
            },
            index: IndexConfig::default(),
            runtime: RuntimeConfig::default(),
            embedding: EmbeddingConfig::default(),
            queue: QueueConfig::default(),
        }
    }

    /// Dataset the runtime imports.
    pub fn dataset_path(&self) -> &Path {
        self.runtime.dataset.as_deref().unwrap_or(&self.source.path)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate index
    if !(0.0..=1.0).contains(&config.index.fuzzy) {
        anyhow::bail!("index.fuzzy must be in [0.0, 1.0]");
    }
    let boost = &config.index.boost;
    for (name, value) in [
        ("title", boost.title),
        ("tags", boost.tags),
        ("authors", boost.authors),
    ] {
        if value <= 0.0 {
            anyhow::bail!("index.boost.{} must be > 0", name);
        }
    }
    if config.index.result_limit < 1 {
        anyhow::bail!("index.result_limit must be >= 1");
    }

    // Validate runtime
    if config.runtime.fts_columns.is_empty() {
        anyhow::bail!("runtime.fts_columns must not be empty");
    }
    for column in &config.runtime.fts_columns {
        if !KNOWN_COLUMNS.contains(&column.as_str()) {
            anyhow::bail!(
                "Unknown FTS column: '{}'. Must be one of: {}",
                column,
                KNOWN_COLUMNS.join(", ")
            );
        }
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.max_input_chars == 0 {
        anyhow::bail!("embedding.max_input_chars must be > 0");
    }

    Ok(())
}
