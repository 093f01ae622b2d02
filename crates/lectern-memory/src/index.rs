//! Embedding index over the chunks of one document.

use std::collections::HashMap;
use std::sync::Arc;

use lectern_llm::Embedder;

use crate::document::{Chunk, DocumentMetadata};
use crate::error::{IndexError, Result};
use crate::vector_store::{ScoredVectorPoint, VectorPoint, VectorStore};

pub const DEFAULT_TOP_K: usize = 5;

/// A chunk returned by [`VectorIndex::query`] with its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunks of one document embedded with one embedder.
///
/// The collection is keyed by the embedder's model id, so vectors from
/// different models never share a collection.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    collection: String,
    dimensions: usize,
    len: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("collection", &self.collection)
            .field("model_id", &self.embedder.model_id())
            .field("dimensions", &self.dimensions)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// `<prefix>_<slug>` where the slug is the model id lowercased with every run of
/// non-alphanumeric characters collapsed to `_`.
#[must_use]
pub fn collection_name(prefix: &str, model_id: &str) -> String {
    let mut slug = String::with_capacity(model_id.len());
    for c in model_id.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    format!("{prefix}_{slug}")
}

fn point_id(collection: &str, chunk_index: usize) -> String {
    let name = format!("{collection}:{chunk_index}");
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn chunk_payload(chunk: &Chunk) -> HashMap<String, serde_json::Value> {
    let mut payload = HashMap::from([
        ("content".to_owned(), serde_json::json!(chunk.content)),
        ("chunk_index".to_owned(), serde_json::json!(chunk.chunk_index)),
        ("source".to_owned(), serde_json::json!(chunk.metadata.source)),
        (
            "content_type".to_owned(),
            serde_json::json!(chunk.metadata.content_type),
        ),
    ]);
    if let Some(page) = chunk.metadata.page {
        payload.insert("page".to_owned(), serde_json::json!(page));
    }
    payload
}

fn chunk_from_point(point: &ScoredVectorPoint) -> Result<Chunk> {
    let field = |name: &str| {
        point
            .payload
            .get(name)
            .ok_or_else(|| IndexError::Payload(format!("point {} lacks `{name}`", point.id)))
    };
    let content = field("content")?
        .as_str()
        .ok_or_else(|| IndexError::Payload(format!("point {}: content is not a string", point.id)))?
        .to_owned();
    let chunk_index = field("chunk_index")?
        .as_u64()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| {
            IndexError::Payload(format!("point {}: chunk_index is not an integer", point.id))
        })?;
    let source = field("source")?.as_str().unwrap_or_default();
    let content_type = point
        .payload
        .get("content_type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();

    let mut metadata = DocumentMetadata::new(source, content_type);
    metadata.page = point
        .payload
        .get("page")
        .and_then(serde_json::Value::as_u64)
        .and_then(|p| usize::try_from(p).ok());

    Ok(Chunk {
        content,
        metadata,
        chunk_index,
    })
}

impl VectorIndex {
    /// Embed `chunks` and store them in a fresh collection named after the embedder.
    ///
    /// Any existing collection of the same name is dropped first. When embedding
    /// fails nothing is created; when the upsert fails the new collection is removed.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Embedding`] if the embedder fails, or a store error.
    pub async fn build(
        chunks: &[Chunk],
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection_prefix: &str,
    ) -> Result<Self> {
        let collection = collection_name(collection_prefix, embedder.model_id());
        store.delete_collection(&collection).await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts).await?
        };
        if vectors.len() != chunks.len() {
            return Err(IndexError::EmbeddingCount {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }

        let dimensions = match vectors.first() {
            Some(first) if first.is_empty() => return Err(IndexError::EmptyEmbedding),
            Some(first) => first.len(),
            None => 0,
        };
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }

        let index = Self {
            store,
            embedder,
            collection,
            dimensions,
            len: chunks.len(),
        };
        if chunks.is_empty() {
            tracing::info!(collection = %index.collection, "built empty index");
            return Ok(index);
        }

        index
            .store
            .ensure_collection(&index.collection, dimensions as u64)
            .await?;

        let points = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorPoint {
                id: point_id(&index.collection, chunk.chunk_index),
                vector,
                payload: chunk_payload(chunk),
            })
            .collect();

        if let Err(e) = index.store.upsert(&index.collection, points).await {
            tracing::error!(collection = %index.collection, "upsert failed, discarding collection: {e}");
            if let Err(cleanup) = index.store.delete_collection(&index.collection).await {
                tracing::warn!(collection = %index.collection, "failed to discard collection: {cleanup}");
            }
            return Err(e.into());
        }

        tracing::info!(
            collection = %index.collection,
            chunks = index.len,
            dimensions,
            "built vector index"
        );
        Ok(index)
    }

    /// Return up to `k` chunks most similar to `text`, best first. Equal scores
    /// are ordered by ascending `chunk_index`.
    ///
    /// One extra point is requested from the store so a tie straddling position
    /// `k` is settled by `chunk_index` rather than by backend order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or the store search fails.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if self.len == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(text).await?;
        if vector.is_empty() {
            return Err(IndexError::EmptyEmbedding);
        }
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        let limit = u64::try_from(k.saturating_add(1)).unwrap_or(u64::MAX);
        let points = self.store.search(&self.collection, vector, limit).await?;

        let mut results = points
            .iter()
            .map(|p| {
                Ok(RetrievedChunk {
                    chunk: chunk_from_point(p)?,
                    score: p.score,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        results.truncate(k);

        tracing::debug!(
            collection = %self.collection,
            k,
            hits = results.len(),
            top_score = results.first().map(|r| r.score),
            "retrieved chunks"
        );
        Ok(results)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}
