//! HTTP Backend Implementation
//!
//! Chat backend reached over HTTP with JSON bodies.
//!
//! # Endpoints
//!
//! - `GET  {base}/api/chat/{session}` - persisted records of a session
//! - `POST {base}/api/chat/{session}` - `{ "question" }` → `{ "answer", "remaining" }`
//!
//! Timeouts are enforced by the HTTP client and surface as
//! [`BackendError::Transport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use super::traits::{Answer, BackendError, ChatBackend, Question};
use crate::config::ChatConfig;
use crate::messages::SessionId;
use crate::session::Session;

/// Path segments between the base URL and the session id
const SESSION_PATH: [&str; 2] = ["api", "chat"];

/// HTTP chat backend client
#[derive(Clone, Debug)]
pub struct HttpChatBackend {
    /// Base URL of the chat service
    base_url: Url,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpChatBackend {
    /// Create a new HTTP backend
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let base_url = parse_base_url(base_url)?;
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Client)?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Create from the chat configuration
    ///
    /// # Errors
    ///
    /// See [`HttpChatBackend::new`].
    pub fn from_config(config: &ChatConfig) -> Result<Self, BackendError> {
        Self::new(&config.base_url, config.request_timeout)
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the endpoint URL for a session
    fn session_url(&self, session_id: &SessionId) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(SESSION_PATH)
            .push(session_id.as_str());
        Ok(url)
    }

    /// Turn a non-success response into [`BackendError::Status`]
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status { status, body })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, BackendError> {
    let invalid = |reason: String| BackendError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn fetch_session(&self, session_id: &SessionId) -> Result<Session, BackendError> {
        let url = self.session_url(session_id)?;
        tracing::debug!(url = %url, "Fetching session history");

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.to_string(),
                source,
            })?;

        let response = Self::check_status(response).await?;
        response.json::<Session>().await.map_err(BackendError::Decode)
    }

    async fn ask(
        &self,
        session_id: &SessionId,
        question: &Question,
    ) -> Result<Answer, BackendError> {
        let url = self.session_url(session_id)?;
        tracing::debug!(url = %url, "Posting question");

        let response = self
            .http_client
            .post(url.clone())
            .json(question)
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.to_string(),
                source,
            })?;

        let response = Self::check_status(response).await?;
        response.json::<Answer>().await.map_err(BackendError::Decode)
    }
}
