use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

const BASE_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 60;

/// Parse the `Retry-After` header value as seconds, falling back to exponential backoff.
pub(crate) fn retry_delay(response: &reqwest::Response, attempt: u32) -> Duration {
    if let Some(val) = response.headers().get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        return Duration::from_secs(secs.min(MAX_BACKOFF_SECS));
    }
    backoff(attempt)
}

fn backoff(attempt: u32) -> Duration {
    let secs = BASE_BACKOFF_SECS
        .checked_shl(attempt)
        .unwrap_or(MAX_BACKOFF_SECS)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
}

/// Send an HTTP request, retrying up to `max_retries` times on 429 and 503 responses.
///
/// With `max_retries == 0` exactly one request is made. A 503 that survives every
/// attempt is handed back to the caller so its body (typically a model-loading
/// error payload) can be reported; an exhausted 429 becomes [`LlmError::RateLimited`].
///
/// # Errors
///
/// Returns `LlmError::RateLimited` if all attempts are rate limited, or the underlying
/// `reqwest::Error` wrapped as `LlmError::Http` for transport failures.
pub(crate) async fn send_with_retry<F, Fut>(
    provider_name: &str,
    max_retries: u32,
    mut f: F,
) -> Result<reqwest::Response, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let response = f().await.map_err(LlmError::Http)?;
        let status = response.status();

        if !is_retryable(status) {
            return Ok(response);
        }
        if attempt >= max_retries {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::RateLimited);
            }
            return Ok(response);
        }

        let delay = retry_delay(&response, attempt);
        tracing::warn!(
            "{provider_name} returned {status}, retrying in {}s ({}/{})",
            delay.as_secs(),
            attempt + 1,
            max_retries
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
