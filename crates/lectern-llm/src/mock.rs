//! Test-only mock inference provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::InferenceProvider;

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
    /// Returned when the queue is empty. The prompt is echoed in front of it, the way
    /// hosted text-generation endpoints return the full text by default.
    pub default_response: String,
    pub echo_prompt: bool,
    pub fail: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            default_response: " mock answer".into(),
            echo_prompt: true,
            fail: false,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            echo_prompt: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl InferenceProvider for MockProvider {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_owned());
        }
        if self.fail {
            return Err(LlmError::UnexpectedResponse {
                provider: "mock".into(),
                body: r#"{"unexpected":true}"#.into(),
            });
        }
        let queued = self
            .responses
            .lock()
            .ok()
            .and_then(|mut r| (!r.is_empty()).then(|| r.remove(0)));
        let body = queued.unwrap_or_else(|| self.default_response.clone());
        if self.echo_prompt {
            Ok(format!("{prompt}{body}"))
        } else {
            Ok(body)
        }
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
