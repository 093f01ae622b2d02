use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use lectern_llm::hf_embed::DEFAULT_EMBEDDING_BASE_URL;
use lectern_llm::huggingface::DEFAULT_INFERENCE_URL;
use lectern_memory::DEFAULT_TOP_K;

use crate::secret::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

fn default_inference_endpoint() -> String {
    DEFAULT_INFERENCE_URL.into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,
    /// Extra attempts on 429/503. Zero means exactly one call per question.
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_inference_endpoint(),
            max_retries: 0,
        }
    }
}

/// Where embeddings are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Hosted feature-extraction endpoint.
    #[default]
    HuggingFace,
    /// In-process feature hashing. No network access.
    Hashing,
}

impl EmbeddingBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HuggingFace => "huggingface",
            Self::Hashing => "hashing",
        }
    }
}

impl std::fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_embedding_model() -> String {
    lectern_llm::EmbeddingModel::AllMiniLmL6V2.as_str().into()
}

fn default_embedding_base_url() -> String {
    DEFAULT_EMBEDDING_BASE_URL.into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,
    /// Model preselected for non-interactive commands.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    /// Vector size for the hashing backend. Defaults to the model's native size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
            dimensions: None,
        }
    }
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_top_k() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Memory,
    Qdrant,
}

fn default_collection_prefix() -> String {
    "lectern".into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,
    /// Snapshot directory for the memory backend. Unset keeps the index in memory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_dir: Option<PathBuf>,
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            persist_dir: None,
            collection_prefix: default_collection_prefix(),
            qdrant_url: default_qdrant_url(),
        }
    }
}

fn default_inference_timeout() -> u64 {
    lectern_llm::http::DEFAULT_TIMEOUT_SECS
}

fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_inference_timeout")]
    pub inference_secs: u64,
    #[serde(default = "default_embedding_timeout")]
    pub embedding_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            inference_secs: default_inference_timeout(),
            embedding_secs: default_embedding_timeout(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub api_key: Option<Secret>,
}
