#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request failed with status {status}")]
    Status { status: u16 },

    #[error("inference API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response format from {provider}")]
    UnexpectedResponse { provider: String, body: String },

    #[error("rate limited")]
    RateLimited,

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("unknown embedding model: {0}")]
    UnknownModel(String),

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Raw response body retained for diagnostics, when the failure carried one.
    #[must_use]
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::UnexpectedResponse { body, .. } => Some(body),
            Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
