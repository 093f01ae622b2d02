//! Text-generation client and embedding backends.

pub mod embed;
pub mod error;
pub mod hashing;
pub mod hf_embed;
pub mod http;
pub mod huggingface;
#[cfg(feature = "mock")]
pub mod mock;
pub mod provider;
pub(crate) mod retry;

pub use embed::{EmbedFuture, Embedder, EmbeddingModel};
pub use error::LlmError;
pub use provider::InferenceProvider;
