//! Retry with exponential backoff for HTTP collaborator calls.
//!
//! Retries transient failures (429, 5xx, 408, network errors) and fails fast
//! on client errors (400, 401, 403, 404). A `Retry-After` header, when
//! present, overrides the computed backoff.

use anyhow::Result;
use reqwest::{Response, StatusCode};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(20),
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Delay requested by the server, if it sent one.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Run `operation` until it returns a successful response, a non-transient
/// error, or attempts run out.
pub async fn with_retry<F, Fut>(
    config: &RetryConfig,
    provider: &str,
    operation: F,
) -> Result<Response>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Response>>,
{
    let mut delay = config.initial_delay;
    let mut last_error = String::from("unknown");

    for attempt in 1..=config.max_attempts {
        let mut server_delay = None;

        match operation().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    if attempt > 1 {
                        tracing::info!("{} recovered on attempt {}", provider, attempt);
                    }
                    return Ok(response);
                }
                if !is_transient(status) {
                    let body = response.text().await.unwrap_or_default();
                    anyhow::bail!("{} API error ({}): {}", provider, status, body);
                }
                server_delay = retry_after(&response);
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(
                    "{} returned {} (attempt {}/{}): {}",
                    provider,
                    status,
                    attempt,
                    config.max_attempts,
                    body.chars().take(200).collect::<String>()
                );
                last_error = format!("{}: {}", status, body);
            }
            Err(e) => {
                tracing::warn!(
                    "{} network error (attempt {}/{}): {}",
                    provider,
                    attempt,
                    config.max_attempts,
                    e
                );
                last_error = e.to_string();
            }
        }

        if attempt < config.max_attempts {
            let sleep_for = server_delay.unwrap_or(delay).min(config.max_delay);
            tokio::time::sleep(sleep_for).await;
            delay = (delay * 2).min(config.max_delay);
        }
    }

    anyhow::bail!(
        "{} failed after {} attempts, last error: {}",
        provider,
        config.max_attempts,
        last_error
    )
}
