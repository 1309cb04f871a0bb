pub mod ollama_service;
pub mod open_ai_service;

use std::time::Duration;

use crate::error_handler::{
    HttpError, Provider, ProviderError, ProviderErrorKind, Result, make_snippet,
};

/// Builds the shared reqwest client used by both providers.
pub(crate) fn build_client(timeout_secs: Option<u64>) -> Result<reqwest::Client> {
    let timeout = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(60));

    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()?)
}

/// Checks that `endpoint` is a non-empty http(s) URL.
pub(crate) fn check_endpoint(provider: Provider, endpoint: &str) -> Result<()> {
    let e = endpoint.trim();
    if e.is_empty() || !(e.starts_with("http://") || e.starts_with("https://")) {
        return Err(ProviderError::new(
            provider,
            ProviderErrorKind::InvalidEndpoint(endpoint.to_string()),
        )
        .into());
    }
    Ok(())
}

/// Returns the response unchanged on 2xx; otherwise turns it into a provider error.
pub(crate) async fn ensure_success(
    provider: Provider,
    url: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::new(
        provider,
        ProviderErrorKind::HttpStatus(HttpError {
            status,
            url: url.to_string(),
            snippet: make_snippet(&body, 240),
        }),
    )
    .into())
}
