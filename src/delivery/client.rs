use crate::http::build_http_client;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const BODY_SNIPPET_CHARS: usize = 500;

/// One outbound email, ready for the delivery endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Delivery failure classification. Retryable failures (timeout, network,
/// 5xx) get exactly one retry; terminal failures (4xx, malformed input)
/// never do.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("delivery timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("delivery network failure: {message}")]
    Network { message: String },

    #[error("delivery endpoint returned HTTP {status}")]
    Http { status: u16, body_snippet: String },

    #[error("outbound email rejected before send: {reason}")]
    Malformed { reason: String },
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Malformed { .. } => false,
        }
    }
}

/// Final outcome of a delivery attempt chain. Always a value, never an
/// error escape, so the orchestrator can unconditionally log and continue.
#[derive(Debug, Clone)]
pub enum DeliveryResult {
    Sent { id: String, attempts: u32 },
    Failed { error: DeliveryError, attempts: u32 },
}

impl DeliveryResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Sent { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Client for the outbound email endpoint.
pub struct DeliveryClient {
    endpoint: String,
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    retry_delay: Duration,
    client: Client,
}

impl DeliveryClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<&str>, retry_delay: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            retry_delay,
            client: build_http_client(),
        }
    }

    /// Single delivery attempt under its own deadline.
    pub async fn send(
        &self,
        email: &OutboundEmail,
        timeout: Duration,
    ) -> Result<String, DeliveryError> {
        validate(email)?;

        tokio::time::timeout(timeout, self.post(email))
            .await
            .map_err(|_| DeliveryError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })?
    }

    /// Attempt, classify, and retry at most once after a fixed delay.
    /// Worst-case wall clock is bounded by one delay plus two per-attempt
    /// timeouts, so delivery can never dominate the end-to-end budget.
    pub async fn send_with_retry(&self, email: &OutboundEmail, timeout: Duration) -> DeliveryResult {
        let first = match self.send(email, timeout).await {
            Ok(id) => return DeliveryResult::Sent { id, attempts: 1 },
            Err(e) => e,
        };

        if !first.is_retryable() {
            tracing::warn!(error = %first, "delivery failed permanently, not retrying");
            return DeliveryResult::Failed {
                error: first,
                attempts: 1,
            };
        }

        tracing::warn!(
            error = %first,
            delay_ms = self.retry_delay.as_millis() as u64,
            "delivery failed, retrying once"
        );
        tokio::time::sleep(self.retry_delay).await;

        match self.send(email, timeout).await {
            Ok(id) => DeliveryResult::Sent { id, attempts: 2 },
            Err(error) => {
                tracing::warn!(error = %error, "delivery retry failed, giving up");
                DeliveryResult::Failed { error, attempts: 2 }
            }
        }
    }

    async fn post(&self, email: &OutboundEmail) -> Result<String, DeliveryError> {
        let mut builder = self.client.post(&self.endpoint).json(email);
        if let Some(auth) = &self.cached_auth_header {
            builder = builder.header("Authorization", auth);
        }

        let response = builder.send().await.map_err(|e| DeliveryError::Network {
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_snippet: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(BODY_SNIPPET_CHARS)
                .collect();
            return Err(DeliveryError::Http {
                status: status.as_u16(),
                body_snippet,
            });
        }

        let parsed: SendResponse =
            response.json().await.map_err(|e| DeliveryError::Network {
                message: format!("send-id decode failed: {e}"),
            })?;
        Ok(parsed.id)
    }
}

fn validate(email: &OutboundEmail) -> Result<(), DeliveryError> {
    if email.to.trim().is_empty() {
        return Err(DeliveryError::Malformed {
            reason: "empty recipient".into(),
        });
    }
    if email.from.trim().is_empty() {
        return Err(DeliveryError::Malformed {
            reason: "empty sender".into(),
        });
    }
    Ok(())
}
