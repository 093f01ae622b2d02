use super::{Config, EmbeddingBackend, IndexBackend};

fn parse_enum<T: serde::de::DeserializeOwned>(v: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(v.to_lowercase())).ok()
}

/// Read a numeric override. Unparsable values are logged and skipped.
fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let v = std::env::var(name).ok()?;
    let parsed = v.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {name} value: {v}");
    }
    parsed
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_pipeline();
        self.apply_env_overrides_index();
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("LECTERN_LLM_ENDPOINT") {
            self.llm.endpoint = v;
        }
        if let Some(n) = env_number("LECTERN_LLM_MAX_RETRIES") {
            self.llm.max_retries = n;
        }
        if let Ok(v) = std::env::var("LECTERN_EMBEDDING_BACKEND") {
            if let Some(backend) = parse_enum::<EmbeddingBackend>(&v) {
                self.embedding.backend = backend;
            } else {
                tracing::warn!("ignoring invalid LECTERN_EMBEDDING_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("LECTERN_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("LECTERN_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Some(dims) = env_number("LECTERN_EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = Some(dims);
        }
        if let Some(size) = env_number("LECTERN_CHUNK_SIZE") {
            self.chunking.chunk_size = size;
        }
        if let Some(overlap) = env_number("LECTERN_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = overlap;
        }
        if let Some(k) = env_number("LECTERN_RETRIEVAL_K") {
            self.retrieval.k = k;
        }
        if let Some(secs) = env_number("LECTERN_TIMEOUT_INFERENCE") {
            self.timeouts.inference_secs = secs;
        }
        if let Some(secs) = env_number("LECTERN_TIMEOUT_EMBEDDING") {
            self.timeouts.embedding_secs = secs;
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("LECTERN_INDEX_BACKEND") {
            if let Some(backend) = parse_enum::<IndexBackend>(&v) {
                self.index.backend = backend;
            } else {
                tracing::warn!("ignoring invalid LECTERN_INDEX_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("LECTERN_INDEX_PERSIST_DIR") {
            self.index.persist_dir = (!v.is_empty()).then(|| v.into());
        }
        if let Ok(v) = std::env::var("LECTERN_INDEX_COLLECTION_PREFIX") {
            self.index.collection_prefix = v;
        }
        if let Ok(v) = std::env::var("LECTERN_QDRANT_URL") {
            self.index.qdrant_url = v;
        }
    }

    /// Read the inference API key. `LECTERN_API_KEY` wins over `API_KEY`; empty values are ignored.
    pub fn resolve_secrets(&mut self) {
        let key = ["LECTERN_API_KEY", "API_KEY"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.trim().is_empty());
        if let Some(key) = key {
            self.secrets.api_key = Some(super::Secret::new(key.trim()));
        } else {
            tracing::debug!("no inference API key in environment");
        }
    }
}
