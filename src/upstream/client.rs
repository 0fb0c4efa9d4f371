//! HTTP client for the chat completion API.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use std::time::Duration;
use tracing::{debug, warn};

use super::error::{UpstreamError, UpstreamResult};
use super::types::{CompletionRequest, CompletionResponse};
use crate::config::UpstreamConfig;
use crate::history::Entry;

/// Largest upstream error body kept in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Something that turns an ordered prompt into one assistant reply.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send the full prompt (system entry, history, new user entry) and
    /// return the reply text.
    async fn complete(&self, messages: &[Entry]) -> UpstreamResult<String>;
}

/// Client for the hosted completion endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    /// HTTP client with default headers applied.
    client: Client,
    /// Completion endpoint URL.
    endpoint: String,
    project_name: String,
    temperature: f64,
}

impl HttpChatClient {
    /// Create a new client from configuration.
    pub fn new(config: &UpstreamConfig) -> UpstreamResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(ref key) = config.api_key {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {key}"))?);
        }
        if let Some(ref agent) = config.user_agent {
            headers.insert(USER_AGENT, header_value(agent)?);
        }
        if let Some(ref origin) = config.origin {
            headers.insert(ORIGIN, header_value(origin)?);
        }
        if let Some(ref referer) = config.referer {
            headers.insert(REFERER, header_value(referer)?);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| UpstreamError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.base_url.clone(),
            project_name: config.project_name.clone(),
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn header_value(value: &str) -> UpstreamResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| UpstreamError::Config(format!("invalid header value: {e}")))
}

#[async_trait]
impl ChatCompletion for HttpChatClient {
    async fn complete(&self, messages: &[Entry]) -> UpstreamResult<String> {
        let request = CompletionRequest {
            messages,
            project_name: &self.project_name,
            temperature: self.temperature,
        };

        debug!(
            endpoint = %self.endpoint,
            messages = messages.len(),
            "Sending completion request"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::ParseError(e.to_string()))?;

        if !parsed.success {
            warn!("Upstream flagged success=false but the reply is checked on its message");
        }

        parsed
            .reply()
            .map(str::to_string)
            .ok_or(UpstreamError::EmptyReply)
    }
}
