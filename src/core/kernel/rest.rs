use crate::core::errors::PipelineError;
use crate::core::types::{Envelope, RawResponse};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{instrument, trace};

/// Incremental response body of a streaming call.
pub type ByteStream = BoxStream<'static, Result<Bytes, PipelineError>>;

pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";
pub const EVENT_STREAM_ACCEPT: &str = "text/event-stream";

/// Transport trait for moving signed envelopes over the network
///
/// Every logical operation is a `POST` of the envelope to its own endpoint.
/// Implementations only move bytes; classification happens above them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Buffered call: wait for the whole response body
    ///
    /// # Arguments
    /// * `endpoint` - The API endpoint path
    /// * `envelope` - Signed request body
    ///
    /// # Returns
    /// Status and body text of the response; errors only when no response
    /// arrived (`Transport` or `Timeout`)
    async fn post(&self, endpoint: &str, envelope: &Envelope) -> Result<RawResponse, PipelineError>;

    /// Streaming call: resolve once response headers arrive
    ///
    /// # Returns
    /// The body as a byte stream; a non-2xx status fails with `Http`
    async fn open_stream(
        &self,
        endpoint: &str,
        envelope: &Envelope,
    ) -> Result<ByteStream, PipelineError>;
}

/// Configuration for the reqwest transport
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Ceiling for buffered calls; streams are bounded by cancellation instead
    pub timeout: Duration,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl TransportConfig {
    /// Create a new configuration
    ///
    /// # Arguments
    /// * `base_url` - Base URL for the API
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: crate::core::config::DEFAULT_TIMEOUT,
            user_agent: format!("signwire/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the buffered request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Builder for creating reqwest transports
pub struct TransportBuilder {
    config: TransportConfig,
}

impl TransportBuilder {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Build the transport
    ///
    /// The client itself carries no timeout so streaming bodies are not cut
    /// off; buffered calls set theirs per request.
    pub fn build(self) -> Result<ReqwestTransport, PipelineError> {
        let client = Client::builder()
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| PipelineError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(ReqwestTransport {
            client,
            config: self.config,
        })
    }
}

/// Implementation of `Transport` using reqwest
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    config: TransportConfig,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new(config: TransportConfig) -> Result<Self, PipelineError> {
        TransportBuilder::new(config).build()
    }

    /// Build the full URL for an endpoint
    fn build_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn encode(envelope: &Envelope) -> Result<Vec<u8>, PipelineError> {
        serde_json::to_vec(envelope).map_err(|e| {
            PipelineError::Serialization(format!("Failed to serialize envelope: {}", e))
        })
    }

    fn map_send_error(&self, err: &reqwest::Error) -> PipelineError {
        if err.is_timeout() {
            PipelineError::Timeout(self.config.timeout)
        } else {
            PipelineError::Transport(format!("Request failed: {}", err))
        }
    }

    /// Read an error body and pull a human message out of it
    async fn http_error(response: Response) -> PipelineError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        trace!("Error response body: {}", body);

        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                ["message", "errorMessages"]
                    .iter()
                    .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or_else(|| format!("HTTP error! status: {}", status));

        PipelineError::Http { status, message }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, envelope), fields(endpoint = %endpoint, request_id = %envelope.request_id))]
    async fn post(&self, endpoint: &str, envelope: &Envelope) -> Result<RawResponse, PipelineError> {
        let body = Self::encode(envelope)?;

        let response = self
            .client
            .post(self.build_url(endpoint))
            .timeout(self.config.timeout)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                PipelineError::Timeout(self.config.timeout)
            } else {
                PipelineError::Transport(format!("Failed to read response body: {}", e))
            }
        })?;

        trace!(status, "Response body: {}", body);
        Ok(RawResponse { status, body })
    }

    #[instrument(skip(self, envelope), fields(endpoint = %endpoint, request_id = %envelope.request_id))]
    async fn open_stream(
        &self,
        endpoint: &str,
        envelope: &Envelope,
    ) -> Result<ByteStream, PipelineError> {
        let body = Self::encode(envelope)?;

        let response = self
            .client
            .post(self.build_url(endpoint))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(ACCEPT, EVENT_STREAM_ACCEPT)
            .body(body)
            .send()
            .await
            .map_err(|e| PipelineError::Transport(format!("Stream request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::http_error(response).await);
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk.map_err(|e| PipelineError::Transport(format!("Stream read failed: {}", e)))
            })
            .boxed())
    }
}
