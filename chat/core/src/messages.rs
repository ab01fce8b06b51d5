//! Timeline Messages
//!
//! The value types a renderer sees: one [`Message`] per chat bubble, plus the
//! identifiers and enums that describe it.
//!
//! # Status and origin
//!
//! A message carries a [`MessageStatus`]. The rendering side (user bubble vs.
//! assistant bubble) is never stored; it is derived from the status through
//! [`Message::origin`]:
//!
//! | status    | origin      |
//! |-----------|-------------|
//! | `Local`   | `User`      |
//! | `Loading` | `Assistant` |
//! | `Success` | `Assistant` |
//! | `Error`   | `Assistant` |
//!
//! Messages are immutable values. Finalizing a pending answer produces a new
//! `Message` with the same id, which the controller swaps into the timeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message identifier
///
/// Stable for the lifetime of the entry and used as the render key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    #[must_use]
    pub fn new() -> Self {
        Self(format!("msg_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Session identifier, as understood by the backend
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Wrap a backend session identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a timeline entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Authored by the user
    Local,
    /// An answer is pending
    Loading,
    /// An answer was received
    Success,
    /// The request failed and fallback text is shown
    Error,
}

impl MessageStatus {
    /// Whether no further transition is possible
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// Which side of the conversation a bubble belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    /// The person typing into the composer
    User,
    /// The backend
    Assistant,
}

/// One entry of the timeline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,
    /// Display content (placeholder text while loading)
    pub text: String,
    /// Current status
    pub status: MessageStatus,
}

impl Message {
    /// Create a message with an explicit id
    pub fn new(id: MessageId, status: MessageStatus, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            status,
        }
    }

    /// A user-authored message with a fresh id
    pub fn local(text: impl Into<String>) -> Self {
        Self::new(MessageId::new(), MessageStatus::Local, text)
    }

    /// A pending assistant message with a fresh id
    pub fn loading(placeholder: impl Into<String>) -> Self {
        Self::new(MessageId::new(), MessageStatus::Loading, placeholder)
    }

    /// Rendering side, derived from the status
    #[must_use]
    pub fn origin(&self) -> MessageOrigin {
        match self.status {
            MessageStatus::Local => MessageOrigin::User,
            _ => MessageOrigin::Assistant,
        }
    }

    /// Finalize a loading message with a received answer
    ///
    /// Returns `None` if this message is not loading.
    #[must_use]
    pub fn succeed(&self, reply: impl Into<String>) -> Option<Self> {
        self.settle(MessageStatus::Success, reply.into())
    }

    /// Finalize a loading message with fallback text
    ///
    /// Returns `None` if this message is not loading.
    #[must_use]
    pub fn fail(&self, fallback: impl Into<String>) -> Option<Self> {
        self.settle(MessageStatus::Error, fallback.into())
    }

    fn settle(&self, status: MessageStatus, text: String) -> Option<Self> {
        if self.status != MessageStatus::Loading {
            return None;
        }
        Some(Self {
            id: self.id.clone(),
            text,
            status,
        })
    }
}

/// Notification severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Something degraded but the conversation continues
    Warning,
    /// A request failed
    Error,
}
