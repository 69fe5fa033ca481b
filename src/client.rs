//! HTTP transport for the chat-completions endpoint
//!
//! [`RouterClient`] owns the credentials, the base URL and a pooled
//! `reqwest::Client`. It knows nothing about conversations: it sends one
//! [`Request`] and either parses one [`Response`] or hands the streamed body
//! to the [`ChatStream`] consumer.
//!
//! # Request Flow
//!
//! ```text
//! Request
//!     │
//!     ├─> POST {base}/chat/completions
//!     │     Authorization: Bearer <key>
//!     │     Content-Type: application/json
//!     │     HTTP-Referer / X-Title (only with provider preferences)
//!     │
//!     ├─> non-2xx ──> Error::Transport { status, body }
//!     │
//!     ├─> fetch_chat_completions ─────────> Response
//!     │
//!     └─> fetch_chat_completions_stream ──> ChatStream (line by line)
//! ```
//!
//! No retries happen here; see [`crate::retry`] for a caller-side policy.
//!
//! # Example
//!
//! ```rust,no_run
//! use openrouter_agent::{Message, Request, RouterClient, render_messages};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RouterClient::from_env()?;
//! let request = Request::chat(
//!     "meta-llama/llama-3.2-1b-instruct",
//!     render_messages(&[Message::user("Hello!")]),
//! );
//!
//! let response = client.fetch_chat_completions(&request).await?;
//! if let Some(message) = response.first_message() {
//!     println!("{}", message.content.as_deref().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{self, DEFAULT_BASE_URL};
use crate::stream::{ChatStream, LineSource};
use crate::types::{Request, Response};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::io;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

/// The seam between the agent and the network.
///
/// [`RouterClient`] is the production implementation; tests drive the agent
/// with scripted transports.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// One request, one complete response.
    async fn send(&self, request: &Request) -> Result<Response>;

    /// One request, streamed back as events until `cancel` fires.
    async fn stream(&self, request: &Request, cancel: CancellationToken) -> Result<ChatStream>;
}

/// Client for an OpenRouter-style chat-completions API
#[derive(Clone)]
pub struct RouterClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl RouterClient {
    /// Client for the default base URL.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn builder() -> RouterClientBuilder {
        RouterClientBuilder::default()
    }

    /// Client configured from `OPENROUTER_API_KEY` and `OPENROUTER_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        Self::builder()
            .api_key(config::get_api_key()?)
            .base_url(config::get_base_url(None))
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// POST the request and return the raw response after the status check.
    async fn post(&self, request: &Request) -> Result<reqwest::Response> {
        let mut builder = self
            .http
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        if let Some(provider) = &request.provider {
            if let Some(referer) = &provider.referer_url {
                builder = builder.header("HTTP-Referer", referer);
            }
            if let Some(site) = &provider.site_name {
                builder = builder.header("X-Title", site);
            }
        }

        let body = serde_json::to_vec(request)?;
        log::debug!(
            "POST {} (model: {}, messages: {}, tools: {}, stream: {})",
            self.endpoint(),
            request.model,
            request.messages.len(),
            request.tools.len(),
            request.stream
        );

        let response = builder.body(body).send().await.map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                log::warn!("failed to read error response body: {}", e);
                String::new()
            });
            log::warn!("request failed with status {}", status.as_u16());
            return Err(Error::transport(status.as_u16(), body));
        }

        Ok(response)
    }

    /// Send a request and parse the complete JSON response.
    pub async fn fetch_chat_completions(&self, request: &Request) -> Result<Response> {
        let response = self.post(request).await?;
        let bytes = response.bytes().await.map_err(Error::Http)?;
        let parsed: Response = serde_json::from_slice(&bytes)?;

        log::debug!(
            "response {} with {} choice(s)",
            parsed.id,
            parsed.choices.len()
        );
        Ok(parsed)
    }

    /// Send a streaming request and return the body as text lines.
    ///
    /// `stream` is forced to `true` on the outgoing body.
    pub async fn open_stream(&self, request: &Request) -> Result<LineSource> {
        let request = request.clone().with_stream(true);
        let response = self.post(&request).await?;

        let bytes = response.bytes_stream().map_err(io::Error::other);
        let lines = StreamReader::new(bytes).lines();

        Ok(Box::pin(LinesStream::new(lines)))
    }

    /// Send a streaming request and consume it as [`StreamEvent`]s.
    ///
    /// [`StreamEvent`]: crate::StreamEvent
    pub async fn fetch_chat_completions_stream(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<ChatStream> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let lines = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            lines = self.open_stream(request) => lines?,
        };

        Ok(ChatStream::from_lines(lines, cancel))
    }
}

#[async_trait]
impl ChatTransport for RouterClient {
    async fn send(&self, request: &Request) -> Result<Response> {
        self.fetch_chat_completions(request).await
    }

    async fn stream(&self, request: &Request, cancel: CancellationToken) -> Result<ChatStream> {
        self.fetch_chat_completions_stream(request, cancel).await
    }
}

impl std::fmt::Debug for RouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Builder for [`RouterClient`]
#[derive(Default)]
pub struct RouterClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    http: Option<reqwest::Client>,
}

impl RouterClientBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// API root, e.g. `http://localhost:8080/api/v1`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Whole-request timeout. Ignored when a client is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a pre-configured HTTP client
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn build(self) -> Result<RouterClient> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config("api_key is required"))?;

        let base_url = config::normalize_base_url(
            self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
        );
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::config(format!(
                "base_url must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let http = match self.http {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(Error::Http)?
            }
        };

        Ok(RouterClient {
            api_key,
            base_url,
            http,
        })
    }
}
