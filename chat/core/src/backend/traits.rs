//! Chat Backend Traits
//!
//! Trait definition and wire types for the chat service. The service owns
//! persistence and answer generation; the core only depends on this
//! request/response contract:
//!
//! - read a session's persisted history
//! - post a question and receive a whole (non-streamed) answer

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::messages::SessionId;
use crate::session::Session;

/// Errors talking to the chat backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The configured base URL is unusable
    #[error("Invalid backend URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The HTTP client could not be constructed
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Network-level failure reaching the backend
    #[error("Request to {url} failed: {source}")]
    Transport {
        /// Endpoint that was called
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// The response body did not match the expected shape
    #[error("Failed to decode backend response: {0}")]
    Decode(#[source] reqwest::Error),

    /// Failure reported by a non-HTTP backend
    #[error("{0}")]
    Other(String),
}

/// Body of a question post
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The user's text
    pub question: String,
}

impl Question {
    /// Create a question
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

/// Response to a question post
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// The answer text
    pub answer: String,
    /// Remaining request quota reported by the backend
    ///
    /// Informational only. A value that is not a non-negative integer
    /// decodes as `None` instead of failing the answer.
    #[serde(default, deserialize_with = "lenient_quota")]
    pub remaining: Option<u32>,
}

fn lenient_quota<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_u64)
        .and_then(|n| u32::try_from(n).ok()))
}

/// Chat backend trait
///
/// Implement this trait to put the core in front of a different service.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (for logs)
    fn name(&self) -> &str;

    /// Load the persisted records of a session, oldest first
    async fn fetch_session(&self, session_id: &SessionId) -> Result<Session, BackendError>;

    /// Post a question to a session and wait for the whole answer
    async fn ask(&self, session_id: &SessionId, question: &Question)
        -> Result<Answer, BackendError>;
}
