//! Wiring from [`Config`] to a ready [`Orchestrator`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use lectern_llm::hashing::HashingEmbedder;
use lectern_llm::hf_embed::HfEmbedder;
use lectern_llm::huggingface::HfInferenceProvider;
use lectern_llm::{Embedder, EmbeddingModel};
use lectern_memory::{InMemoryVectorStore, VectorStore};

use crate::config::{Config, EmbeddingBackend, IndexBackend};
use crate::orchestrator::{EmbedderFactory, Orchestrator};

/// `--config` flag, then `LECTERN_CONFIG`, then `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("LECTERN_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

pub struct AppBuilder {
    config: Config,
    config_path: PathBuf,
}

impl AppBuilder {
    /// Load and validate the configuration at `config_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a setting is invalid.
    pub fn load(config_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let config_path = config_path.into();
        let config = Config::load(&config_path)?;
        Self::new(config, config_path)
    }

    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: Config, config_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;
        Ok(Self {
            config,
            config_path: config_path.into(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn api_key(&self) -> Option<String> {
        self.config.api_key().map(|s| s.expose().to_owned())
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn build_provider(&self) -> anyhow::Result<HfInferenceProvider> {
        let client = lectern_llm::http::client_with_timeout(self.config.timeouts.inference_secs)
            .context("failed to build inference HTTP client")?;
        Ok(HfInferenceProvider::new(&self.config.llm.endpoint, self.api_key())
            .with_client(client)
            .with_max_retries(self.config.llm.max_retries))
    }

    /// # Errors
    ///
    /// Returns an error if the snapshot directory cannot be opened or the Qdrant
    /// backend is requested but unavailable.
    pub fn build_store(&self) -> anyhow::Result<Arc<dyn VectorStore>> {
        match self.config.index.backend {
            IndexBackend::Memory => match &self.config.index.persist_dir {
                Some(dir) => {
                    let store = InMemoryVectorStore::persistent(dir).with_context(|| {
                        format!("failed to open index directory {}", dir.display())
                    })?;
                    tracing::info!(dir = %dir.display(), "using persistent in-memory index");
                    Ok(Arc::new(store))
                }
                None => Ok(Arc::new(InMemoryVectorStore::new())),
            },
            #[cfg(feature = "qdrant")]
            IndexBackend::Qdrant => {
                let store = lectern_memory::QdrantStore::connect(&self.config.index.qdrant_url)
                    .context("failed to create Qdrant client")?;
                tracing::info!(url = %self.config.index.qdrant_url, "using Qdrant index");
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "qdrant"))]
            IndexBackend::Qdrant => {
                anyhow::bail!("index.backend = \"qdrant\" requires the `qdrant` feature")
            }
        }
    }

    /// # Errors
    ///
    /// Returns an error if the embedding HTTP client cannot be built.
    pub fn build_embedder_factory(&self) -> anyhow::Result<EmbedderFactory> {
        let dimensions = self.config.embedding.dimensions;
        match self.config.embedding.backend {
            EmbeddingBackend::Hashing => Ok(Box::new(move |model: EmbeddingModel| {
                let dims = dimensions.unwrap_or_else(|| model.dimensions());
                Arc::new(HashingEmbedder::new(model.as_str(), dims)) as Arc<dyn Embedder>
            })),
            EmbeddingBackend::HuggingFace => {
                let client =
                    lectern_llm::http::client_with_timeout(self.config.timeouts.embedding_secs)
                        .context("failed to build embedding HTTP client")?;
                let base_url = self.config.embedding.base_url.clone();
                let api_key = self.api_key();
                Ok(Box::new(move |model: EmbeddingModel| {
                    Arc::new(
                        HfEmbedder::new(base_url.clone(), api_key.clone(), model)
                            .with_client(client.clone()),
                    ) as Arc<dyn Embedder>
                }))
            }
        }
    }

    /// # Errors
    ///
    /// Returns an error if any collaborator cannot be built.
    pub fn build_orchestrator(&self) -> anyhow::Result<Orchestrator<HfInferenceProvider>> {
        let orchestrator = Orchestrator::new(
            self.build_provider()?,
            self.build_store()?,
            self.build_embedder_factory()?,
        )
        .with_splitter(self.config.splitter_config())
        .with_top_k(self.config.retrieval.k)
        .with_collection_prefix(self.config.index.collection_prefix.clone());
        Ok(orchestrator)
    }
}
