use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use crate::error::LlmError;

/// Boxed future returned by an [`Embedder`].
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LlmError>> + Send + 'a>>;

/// Maps text to a fixed-length vector. Object safe so a session can swap
/// implementations at runtime.
pub trait Embedder: Send + Sync {
    /// Identity of the model producing the vectors. Two embedders with the same id
    /// must produce comparable vectors.
    fn model_id(&self) -> &str;

    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>>;

    /// Embed several texts, preserving input order. The default issues one
    /// [`Embedder::embed`] call per text.
    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
        Box::pin(async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            Ok(vectors)
        })
    }
}

/// The embedding models a session may choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingModel {
    AllMiniLmL6V2,
    MultiQaMiniLmL6CosV1,
    BgeBaseEnV15,
}

impl EmbeddingModel {
    pub const ALL: [Self; 3] = [
        Self::AllMiniLmL6V2,
        Self::MultiQaMiniLmL6CosV1,
        Self::BgeBaseEnV15,
    ];

    /// Name shown to users and accepted by [`FromStr`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllMiniLmL6V2 => "all-MiniLM-L6-v2",
            Self::MultiQaMiniLmL6CosV1 => "multi-qa-MiniLM-L6-cos-v1",
            Self::BgeBaseEnV15 => "BAAI/bge-base-en-v1.5",
        }
    }

    /// Fully qualified model repository id.
    #[must_use]
    pub fn repo_id(self) -> &'static str {
        match self {
            Self::AllMiniLmL6V2 => "sentence-transformers/all-MiniLM-L6-v2",
            Self::MultiQaMiniLmL6CosV1 => "sentence-transformers/multi-qa-MiniLM-L6-cos-v1",
            Self::BgeBaseEnV15 => "BAAI/bge-base-en-v1.5",
        }
    }

    #[must_use]
    pub fn dimensions(self) -> usize {
        match self {
            Self::AllMiniLmL6V2 | Self::MultiQaMiniLmL6CosV1 => 384,
            Self::BgeBaseEnV15 => 768,
        }
    }
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingModel {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s) || m.repo_id().eq_ignore_ascii_case(s))
            .ok_or_else(|| LlmError::UnknownModel(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingEmbedder;

    impl Embedder for CountingEmbedder {
        fn model_id(&self) -> &str {
            "counting"
        }

        fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
            #[allow(clippy::cast_precision_loss)]
            let len = text.len() as f32;
            Box::pin(async move { Ok(vec![len]) })
        }
    }

    #[test]
    fn parse_short_and_repo_names() {
        assert_eq!(
            "all-MiniLM-L6-v2".parse::<EmbeddingModel>().unwrap(),
            EmbeddingModel::AllMiniLmL6V2
        );
        assert_eq!(
            "sentence-transformers/multi-qa-MiniLM-L6-cos-v1"
                .parse::<EmbeddingModel>()
                .unwrap(),
            EmbeddingModel::MultiQaMiniLmL6CosV1
        );
        assert_eq!(
            " baai/bge-base-en-v1.5 ".parse::<EmbeddingModel>().unwrap(),
            EmbeddingModel::BgeBaseEnV15
        );
    }

    #[test]
    fn parse_unknown_model_errors() {
        let err = "word2vec".parse::<EmbeddingModel>().unwrap_err();
        assert!(err.to_string().contains("word2vec"));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for model in EmbeddingModel::ALL {
            assert_eq!(model.to_string().parse::<EmbeddingModel>().unwrap(), model);
        }
    }

    #[tokio::test]
    async fn default_batch_preserves_order() {
        let texts = vec!["a".to_owned(), "abc".to_owned(), "ab".to_owned()];
        let vectors = CountingEmbedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![3.0], vec![2.0]]);
    }
}
