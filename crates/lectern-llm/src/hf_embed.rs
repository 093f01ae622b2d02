//! Embeddings from a hosted feature-extraction pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::embed::{EmbedFuture, Embedder, EmbeddingModel};
use crate::error::LlmError;

pub const DEFAULT_EMBEDDING_BASE_URL: &str =
    "https://api-inference.huggingface.co/pipeline/feature-extraction";

pub struct HfEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: EmbeddingModel,
}

impl fmt::Debug for HfEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HfEmbedder")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl HfEmbedder {
    #[must_use]
    pub fn new(mut base_url: String, api_key: Option<String>, model: EmbeddingModel) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            base_url,
            api_key,
            model,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.model.repo_id())
    }

    async fn request<T: Serialize + Sync>(&self, inputs: &T) -> Result<Vec<FeatureOutput>, LlmError> {
        let mut request = self
            .client
            .post(self.url())
            .header("Content-Type", "application/json")
            .json(&EmbeddingRequest { inputs });
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!("embedding API error {status}: {text}");
            return Err(LlmError::Status {
                status: status.as_u16(),
            });
        }

        let outputs: Vec<FeatureOutput> = serde_json::from_str(&text).map_err(|e| {
            tracing::error!("unexpected embedding response format: {text}");
            LlmError::Json(e)
        })?;
        Ok(outputs)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a, T: Serialize> {
    inputs: &'a T,
}

/// One input's features: either already pooled, or one vector per token.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureOutput {
    Pooled(Vec<f32>),
    Tokens(Vec<Vec<f32>>),
}

impl FeatureOutput {
    fn into_vector(self) -> Result<Vec<f32>, LlmError> {
        match self {
            Self::Pooled(v) if !v.is_empty() => Ok(v),
            Self::Tokens(tokens) if !tokens.is_empty() => Ok(mean_pool(&tokens)),
            _ => Err(LlmError::EmptyResponse {
                provider: "huggingface-embeddings".into(),
            }),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_pool(tokens: &[Vec<f32>]) -> Vec<f32> {
    let dim = tokens.iter().map(Vec::len).max().unwrap_or(0);
    let mut pooled = vec![0.0f32; dim];
    for token in tokens {
        for (acc, x) in pooled.iter_mut().zip(token) {
            *acc += x;
        }
    }
    let n = tokens.len() as f32;
    for x in &mut pooled {
        *x /= n;
    }
    pooled
}

impl Embedder for HfEmbedder {
    fn model_id(&self) -> &str {
        self.model.as_str()
    }

    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
        Box::pin(async move {
            let mut outputs = self.request(&[text]).await?;
            if outputs.len() != 1 {
                return Err(LlmError::EmptyResponse {
                    provider: "huggingface-embeddings".into(),
                });
            }
            outputs.remove(0).into_vector()
        })
    }

    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let outputs = self.request(&texts).await?;
            if outputs.len() != texts.len() {
                tracing::error!(
                    expected = texts.len(),
                    got = outputs.len(),
                    "embedding batch size mismatch"
                );
                return Err(LlmError::Other(format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    outputs.len()
                )));
            }
            outputs.into_iter().map(FeatureOutput::into_vector).collect()
        })
    }
}
