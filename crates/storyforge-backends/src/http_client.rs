//! Shared HTTP client infrastructure for backend adapters
//!
//! One `reqwest::Client` is built per adapter and reused for every call, with
//! timeout and retry policies applied per request.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use storyforge_utils::error::BackendError;
use storyforge_utils::redaction::redact_error_message;

/// Default maximum HTTP timeout (5 minutes)
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Default connect timeout (30 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of retry attempts for 5xx and network failures
const MAX_RETRIES: u32 = 2;

/// Initial backoff duration for retries (1 second)
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Shared HTTP client for generation backends
///
/// Provides connection reuse, a per-request timeout capped by `max_timeout`,
/// and retry with backoff (1s, 2s) for 5xx and network
/// failures. 4xx responses are never retried.
#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Misconfiguration` if the client cannot be constructed
    pub fn new() -> Result<Self, BackendError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT)
    }

    /// Create a new HTTP client with a custom maximum timeout
    pub fn with_max_timeout(max_timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .use_rustls_tls()
            .build()
            .map_err(|e| {
                BackendError::Misconfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout,
        })
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Execute an HTTP request with timeout and retry policy
    ///
    /// - Per-request timeout: `min(request_timeout, max_timeout)`
    /// - Up to 2 retries for 5xx and network failures, backoff 1s then 2s
    /// - No retries for 4xx errors
    ///
    /// # Errors
    ///
    /// - `ProviderAuth` for 401/403
    /// - `ProviderQuota` for 429
    /// - `ProviderOutage` for 5xx after retries
    /// - `Timeout` when the request exceeds its bound
    /// - `Transport` for network errors after retries and other 4xx
    pub async fn execute_with_retry(
        &self,
        request_builder: RequestBuilder,
        request_timeout: Duration,
        provider_name: &str,
    ) -> Result<Response, BackendError> {
        let effective_timeout = request_timeout.min(self.max_timeout);

        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = request_builder
                .try_clone()
                .ok_or_else(|| {
                    BackendError::Transport("Failed to clone request for retry".to_string())
                })?
                .timeout(effective_timeout)
                .build()
                .map_err(|e| {
                    BackendError::Transport(format!(
                        "Failed to build request: {}",
                        redact_error_message(&e.to_string())
                    ))
                })?;

            debug!(
                backend = provider_name,
                attempt = attempt,
                timeout_secs = effective_timeout.as_secs(),
                "Executing HTTP request"
            );

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_client_error() {
                        return Err(map_client_error(status, provider_name));
                    }

                    if status.is_server_error() {
                        if attempt <= MAX_RETRIES {
                            warn!(
                                backend = provider_name,
                                attempt = attempt,
                                status = status.as_u16(),
                                "Server error, will retry"
                            );
                            tokio::time::sleep(backoff_for(attempt)).await;
                            continue;
                        }

                        return Err(BackendError::ProviderOutage(format!(
                            "{provider_name} returned server error: {status}"
                        )));
                    }

                    return Ok(response);
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(BackendError::Timeout {
                            duration: effective_timeout,
                        });
                    }

                    let message = redact_error_message(&e.to_string());

                    if attempt <= MAX_RETRIES {
                        warn!(
                            backend = provider_name,
                            attempt = attempt,
                            error = %message,
                            "Network error, will retry"
                        );
                        tokio::time::sleep(backoff_for(attempt)).await;
                        continue;
                    }

                    return Err(BackendError::Transport(format!(
                        "{provider_name} request failed: {message}"
                    )));
                }
            }
        }
    }

    /// Single unretried request used for liveness probes.
    ///
    /// Any 2xx answer counts as healthy. Everything else is `false`.
    pub async fn probe(&self, request_builder: RequestBuilder, timeout: Duration) -> bool {
        match request_builder
            .timeout(timeout.min(self.max_timeout))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %redact_error_message(&e.to_string()), "Health probe failed");
                false
            }
        }
    }
}

fn backoff_for(attempt: u32) -> Duration {
    INITIAL_BACKOFF * attempt
}

/// Map HTTP client error status codes to `BackendError` variants
///
/// - 401/403 → `ProviderAuth`
/// - 429 → `ProviderQuota`
/// - Other 4xx → `Transport`
pub(crate) fn map_client_error(status: StatusCode, provider_name: &str) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::ProviderAuth(format!(
            "{provider_name} authentication failed: {status}"
        )),
        StatusCode::TOO_MANY_REQUESTS => {
            BackendError::ProviderQuota(format!("{provider_name} rate limit exceeded: {status}"))
        }
        _ => BackendError::Transport(format!(
            "{provider_name} returned client error: {status}"
        )),
    }
}

/// Read a JSON body, mapping decode failures to `MalformedOutput`.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
    provider_name: &str,
) -> Result<T, BackendError> {
    let bytes = response.bytes().await.map_err(|e| {
        BackendError::Transport(format!(
            "{provider_name} response body could not be read: {}",
            redact_error_message(&e.to_string())
        ))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        BackendError::MalformedOutput(format!("{provider_name} response is not valid JSON: {e}"))
    })
}
