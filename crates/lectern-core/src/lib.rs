//! Configuration, prompt assembly, and the question-answering orchestrator.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod secret;
pub mod session;
pub mod upload;

pub use error::PipelineError;
pub use orchestrator::{EmbedderFactory, Orchestrator, Reply};
