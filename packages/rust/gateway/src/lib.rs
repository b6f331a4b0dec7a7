//! Chat-completion gateway.
//!
//! The pipeline only ever sees the [`LlmGateway`] capability: one request in,
//! the model's literal answer out. [`HttpGateway`] is the production
//! implementation against an OpenAI-compatible `/chat/completions` endpoint.
//! It never retries; any failure is final for the run.

mod types;

use std::time::Duration;

use async_trait::async_trait;
use harvest_shared::{Credentials, GatewayError, HarvestError, Result};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use types::{ChatRequest, Message, Usage};

/// User-Agent string for gateway requests.
const USER_AGENT: &str = concat!("Harvest/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in [`GatewayError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Capability to turn a chat request into the model's raw text answer.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Send one request and return `choices[0].message.content`.
    async fn send(&self, request: &ChatRequest) -> std::result::Result<String, GatewayError>;
}

// ---------------------------------------------------------------------------
// HttpGateway
// ---------------------------------------------------------------------------

/// Bearer-authenticated HTTPS gateway.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: Client,
    endpoint: Url,
    credentials: Credentials,
}

impl HttpGateway {
    /// Build a gateway for `endpoint`; `timeout` bounds the whole request.
    pub fn new(endpoint: Url, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                HarvestError::from(GatewayError::Transport(format!(
                    "failed to build HTTP client: {e}"
                )))
            })?;

        Ok(Self {
            http,
            endpoint,
            credentials,
        })
    }
}

#[async_trait]
impl LlmGateway for HttpGateway {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, model = %request.model))]
    async fn send(&self, request: &ChatRequest) -> std::result::Result<String, GatewayError> {
        let start = std::time::Instant::now();

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(self.credentials.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "chat completion request failed");
                GatewayError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "chat completion returned error status");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let raw: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        if let Some(usage) = &raw.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "token usage"
            );
        }

        let content = raw.into_first_content().ok_or(GatewayError::NoChoices)?;

        info!(
            chars = content.chars().count(),
            latency_ms = start.elapsed().as_millis() as u64,
            "received model answer"
        );

        Ok(content)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
