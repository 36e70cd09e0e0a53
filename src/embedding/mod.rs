//! Embedding providers and the text embedding pipeline.
//!
//! Providers implement [`Embedder`] on top of the core
//! [`EmbeddingProvider`] metadata trait:
//! - **[`OpenAIProvider`]** calls an OpenAI-compatible `/embeddings` endpoint.
//! - **[`OllamaProvider`]** calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`LocalProvider`]** runs a model in-process via fastembed; no network
//!   calls after the model download.
//!
//! [`EmbeddingPipeline`] is what the runtime talks to. It creates the
//! provider once, on first use, and turns a text into a single mean-pooled,
//! L2-normalized vector. Every failure degrades to an empty vector: semantic
//! search is optional and never takes the caller down with it.
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use vault_search_core::embedding::{l2_normalize, mean_pool};
use vault_search_core::segment::segment_text;

pub use vault_search_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;

/// An embedding backend that can turn texts into vectors.
#[async_trait]
pub trait Embedder: EmbeddingProvider {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

// ============ Remote providers ============

/// Send `body` to `url` with retry/backoff, returning the response JSON.
async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                // Rate limited or server error, retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} connection error ({}): {}", label, url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", label)))
}

fn json_to_vec(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|items| items.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

/// Embedding provider using the OpenAI API (or a compatible endpoint).
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config,
    /// or if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            base_url,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

#[async_trait]
impl Embedder for OpenAIProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let json = post_json_with_retry(
            &self.client,
            &url,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by `data[].index` when present.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(json_to_vec)
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, embedding));
    }
    indexed.sort_by_key(|(index, _)| *index);

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default:
/// `http://localhost:11434`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client,
        })
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

#[async_trait]
impl Embedder for OllamaProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let url = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let json =
            post_json_with_retry(&self.client, &url, None, &body, self.max_retries, "Ollama")
                .await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| json_to_vec(e).ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array")))
        .collect()
}

// ============ Local Provider (fastembed) ============

#[cfg_attr(not(feature = "local-embeddings-fastembed"), allow(dead_code))]
fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| "all-minilm-l6-v2".to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "multilingual-e5-small" => 384,
        "multilingual-e5-base" => 768,
        "multilingual-e5-large" => 1024,
        _ => 384,
    });

    (model_name, dims)
}

/// In-process embedding via fastembed with a bundled ONNX runtime.
///
/// The model is downloaded from Hugging Face on first load and cached.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    /// Load the configured model. Blocks a worker thread while it initializes.
    pub async fn load(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        let fastembed_model = config_to_fastembed_model(&model_name)?;

        let model = tokio::task::spawn_blocking(move || {
            fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed_model).with_show_download_progress(false),
            )
            .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))
        })
        .await??;

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow!("Local embedding model lock poisoned"))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ),
    }
}

/// Create the configured [`Embedder`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"local"` | `LocalProvider` (feature `local-embeddings-fastembed`) |
///
/// # Errors
///
/// Fails for `"disabled"`, unknown provider names, and providers that
/// cannot be initialized (missing config, API key, or feature flag).
pub async fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalProvider::load(config).await?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        "disabled" => bail!("Embedding provider is disabled"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Pipeline ============

/// Lazily-loaded text → vector pipeline.
///
/// The embedder is created at most once; if that fails, the pipeline
/// stays unavailable for its lifetime and [`embed`](Self::embed) keeps
/// returning empty vectors.
pub struct EmbeddingPipeline {
    config: EmbeddingConfig,
    embedder: OnceCell<Option<Arc<dyn Embedder>>>,
}

impl EmbeddingPipeline {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            embedder: OnceCell::new(),
        }
    }

    /// Pipeline backed by an already-constructed embedder.
    pub fn with_embedder(config: EmbeddingConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            config,
            embedder: OnceCell::new_with(Some(Some(embedder))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled() || matches!(self.embedder.get(), Some(Some(_)))
    }

    async fn embedder(&self) -> Option<Arc<dyn Embedder>> {
        self.embedder
            .get_or_init(|| async {
                if !self.config.is_enabled() {
                    debug!("embedding provider disabled, semantic search unavailable");
                    return None;
                }
                match create_embedder(&self.config).await {
                    Ok(embedder) => {
                        info!(
                            model = embedder.model_name(),
                            dims = embedder.dims(),
                            "embedding pipeline loaded"
                        );
                        Some(embedder)
                    }
                    Err(e) => {
                        warn!(error = %e, "embedding pipeline failed to load");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Mean-pooled, normalized embedding of `text`, or empty if unavailable.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        let segments = segment_text(text, self.config.max_input_chars);
        if segments.is_empty() {
            return Vec::new();
        }
        let Some(embedder) = self.embedder().await else {
            return Vec::new();
        };

        let mut vectors = Vec::with_capacity(segments.len());
        for batch in segments.chunks(self.config.batch_size.max(1)) {
            match embedder.embed_texts(batch).await {
                Ok(mut batch_vectors) => vectors.append(&mut batch_vectors),
                Err(e) => {
                    warn!(error = %e, "embedding failed");
                    return Vec::new();
                }
            }
        }

        let mut pooled = mean_pool(&vectors);
        l2_normalize(&mut pooled);
        pooled
    }
}
