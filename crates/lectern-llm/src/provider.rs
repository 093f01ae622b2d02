use std::future::Future;

use crate::error::LlmError;

/// A remote text-completion endpoint: one prompt in, raw generated text out.
pub trait InferenceProvider: Send + Sync {
    /// Send `prompt` to the model and return its raw output.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or when the response does not have the
    /// expected shape.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, LlmError>> + Send;

    fn name(&self) -> &str;
}
