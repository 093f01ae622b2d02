//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Default request timeout applied when the caller does not supply one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Create a shared HTTP client with the standard Lectern configuration.
///
/// Config: 30s connect timeout, `timeout_secs` request timeout, rustls TLS,
/// `lectern/{version}` user-agent, redirect limit 10.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn client_with_timeout(timeout_secs: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("lectern/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

/// Client with [`DEFAULT_TIMEOUT_SECS`], falling back to reqwest defaults if the
/// builder fails.
#[must_use]
pub fn default_client() -> reqwest::Client {
    client_with_timeout(DEFAULT_TIMEOUT_SECS).unwrap_or_else(|e| {
        tracing::warn!("HTTP client builder failed, using defaults: {e}");
        reqwest::Client::new()
    })
}
