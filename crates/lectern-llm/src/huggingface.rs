//! Client for hosted text-generation endpoints speaking the Hugging Face
//! inference protocol: `POST {"inputs": ...}` answered by `[{"generated_text": ...}]`.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::LlmError;
use crate::provider::InferenceProvider;
use crate::retry::send_with_retry;

pub const DEFAULT_INFERENCE_URL: &str =
    "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.3";

const PROVIDER_NAME: &str = "huggingface";

pub struct HfInferenceProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl fmt::Debug for HfInferenceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HfInferenceProvider")
            .field("client", &"<reqwest::Client>")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Clone for HfInferenceProvider {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            max_retries: self.max_retries,
        }
    }
}

impl HfInferenceProvider {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        let endpoint = endpoint.into();
        if api_key.is_none() {
            tracing::warn!("no API key configured for {endpoint}, requests are sent unauthenticated");
        }
        Self {
            client: crate::http::default_client(),
            endpoint,
            api_key,
            max_retries: 0,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Retry 429/503 responses up to `max_retries` times. Zero (the default) keeps
    /// the one-request-per-call behaviour.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// Shape of a decoded inference response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    /// A sequence whose first element carries `generated_text`.
    Generated(String),
    /// An object with an explicit `error` field.
    ApiError(String),
    /// Anything else.
    Unexpected,
}

/// Classify a decoded response body.
#[must_use]
pub fn parse_response(value: &Value) -> ParsedResponse {
    match value {
        Value::Array(items) => items
            .first()
            .and_then(|first| first.get("generated_text"))
            .and_then(Value::as_str)
            .map_or(ParsedResponse::Unexpected, |text| {
                ParsedResponse::Generated(text.to_owned())
            }),
        Value::Object(map) => match map.get("error") {
            Some(Value::String(message)) => ParsedResponse::ApiError(message.clone()),
            Some(other) => ParsedResponse::ApiError(other.to_string()),
            None => ParsedResponse::Unexpected,
        },
        _ => ParsedResponse::Unexpected,
    }
}

impl InferenceProvider for HfInferenceProvider {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = InferenceRequest { inputs: prompt };

        let response = send_with_retry(PROVIDER_NAME, self.max_retries, || {
            let mut request = self
                .client
                .post(&self.endpoint)
                .header("Content-Type", "application/json")
                .json(&body);
            if let Some(ref key) = self.api_key {
                request = request.header("Authorization", format!("Bearer {key}"));
            }
            request.send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("inference response is not JSON (status {status}): {text}");
                if !status.is_success() {
                    return Err(LlmError::Status {
                        status: status.as_u16(),
                    });
                }
                return Err(LlmError::Json(e));
            }
        };

        match parse_response(&value) {
            ParsedResponse::ApiError(message) => {
                tracing::error!("inference API error {status}: {message}");
                Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
            _ if !status.is_success() => {
                tracing::error!("inference request failed {status}: {text}");
                Err(LlmError::Status {
                    status: status.as_u16(),
                })
            }
            ParsedResponse::Generated(generated) => {
                tracing::debug!(chars = generated.len(), "inference response received");
                Ok(generated)
            }
            ParsedResponse::Unexpected => {
                tracing::error!("unexpected inference response format: {text}");
                Err(LlmError::UnexpectedResponse {
                    provider: PROVIDER_NAME.into(),
                    body: text,
                })
            }
        }
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}
