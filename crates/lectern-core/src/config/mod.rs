mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};
use lectern_llm::EmbeddingModel;
use lectern_memory::document::SplitterConfig;

use crate::secret::Secret;

impl Config {
    /// Load configuration from a TOML file with env var overrides and secrets.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.resolve_secrets();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be greater than zero");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            tracing::warn!(
                chunk_size = self.chunking.chunk_size,
                chunk_overlap = self.chunking.chunk_overlap,
                "chunk overlap is not smaller than chunk size and will be clamped"
            );
        }
        if self.retrieval.k == 0 {
            bail!("retrieval.k must be greater than zero");
        }
        if self.embedding.dimensions == Some(0) {
            bail!("embedding.dimensions must be greater than zero");
        }
        self.embedding_model()?;
        if self.llm.endpoint.trim().is_empty() {
            bail!("llm.endpoint must not be empty");
        }
        Ok(())
    }

    /// The configured default embedding model.
    ///
    /// # Errors
    ///
    /// Returns an error if `embedding.model` is not one of the supported models.
    pub fn embedding_model(&self) -> anyhow::Result<EmbeddingModel> {
        self.embedding.model.parse::<EmbeddingModel>().with_context(|| {
            format!(
                "embedding.model must be one of: {}",
                EmbeddingModel::ALL
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }

    #[must_use]
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig::with_sizes(self.chunking.chunk_size, self.chunking.chunk_overlap)
    }

    #[must_use]
    pub fn api_key(&self) -> Option<&Secret> {
        self.secrets.api_key.as_ref()
    }
}
