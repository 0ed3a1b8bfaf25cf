//! Retrying HTTP fetch layer
//!
//! A single logical fetch makes up to `timeouts.len()` attempts, attempt `i`
//! using `timeouts[min(i, len) - 1]` as its per-attempt timeout. Failures are
//! retried immediately (the escalating timeouts are the only backoff) and
//! classified only once the budget is exhausted.

use crate::error::{BenderError, BenderResult};
use std::time::Duration;
use tracing::{error, warn};

/// A completed HTTP exchange. Non-2xx statuses are carried here rather than
/// as transport errors so the retry layer can classify them.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking GET transport. The production implementation is [`UreqTransport`];
/// tests substitute scripted fakes.
pub trait Transport: Send + Sync {
    /// Issue one GET attempt. `Err` means no status line was obtained
    /// (connect failure, timeout); the message is the underlying error text.
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, String>;
}

/// Transport backed by a shared `ureq` agent
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::config_builder().build().into(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, String> {
        let result = self
            .agent
            .get(url)
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call();

        match result {
            Ok(mut response) => {
                let status = response.status().as_u16();
                let body = response
                    .body_mut()
                    .read_to_string()
                    .map_err(|e| e.to_string())?;
                Ok(HttpResponse { status, body })
            }
            // ureq reports non-2xx statuses as errors; fold them back into a
            // response so classification stays in one place
            Err(ureq::Error::StatusCode(code)) => Ok(HttpResponse {
                status: code,
                body: String::new(),
            }),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Issues a logical fetch with bounded retries and escalating timeouts
pub struct RetryFetcher {
    transport: Box<dyn Transport>,
}

impl RetryFetcher {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch `url`, making one attempt per entry in `timeouts` (values in
    /// seconds). Returns the body of the first 2xx response.
    ///
    /// Idempotent against the target; safe to retry freely.
    pub fn fetch(&self, url: &str, timeouts: &[u64]) -> BenderResult<String> {
        assert!(!timeouts.is_empty(), "at least one timeout is required");

        let attempts = timeouts.len();
        let mut last_status: Option<u16> = None;
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            let timeout = Duration::from_secs(timeouts[attempt.min(timeouts.len()) - 1]);

            match self.transport.get(url, timeout) {
                Ok(response) if response.is_success() => return Ok(response.body),
                Ok(response) => {
                    last_status = Some(response.status);
                    last_reason = format!("status {}", response.status);
                }
                Err(reason) => {
                    last_status = None;
                    last_reason = reason;
                }
            }

            if attempt < attempts {
                warn!(url, attempt, reason = %last_reason, "fetch attempt failed, retrying");
            } else {
                error!(url, attempt, reason = %last_reason, "fetch failed, no attempts left");
            }
        }

        Err(classify_failure(url, last_status, last_reason))
    }
}

/// Classify an exhausted fetch into the error taxonomy
fn classify_failure(url: &str, status: Option<u16>, reason: String) -> BenderError {
    let url = url.to_string();
    match status {
        Some(status) if status >= 500 => BenderError::ServerError { status, url },
        Some(status @ (404 | 410)) => BenderError::NotFound { status, url },
        Some(status) => BenderError::ClientError { status, url },
        None => BenderError::Transport { url, reason },
    }
}
