#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] lectern_llm::LlmError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    #[error("embedding dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedder returned an empty vector")]
    EmptyEmbedding,

    #[error("embedder returned {actual} vectors for {expected} chunks")]
    EmbeddingCount { expected: usize, actual: usize },

    #[error("malformed point payload: {0}")]
    Payload(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
