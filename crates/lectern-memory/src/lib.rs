//! Document loading, chunking, and vector indexing.

pub mod document;
pub mod error;
pub mod in_memory_store;
pub mod index;
#[cfg(feature = "qdrant")]
pub mod qdrant_store;
pub mod vector_store;

pub use error::IndexError;
pub use in_memory_store::InMemoryVectorStore;
pub use index::{DEFAULT_TOP_K, RetrievedChunk, VectorIndex};
#[cfg(feature = "qdrant")]
pub use qdrant_store::QdrantStore;
pub use vector_store::{ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};
