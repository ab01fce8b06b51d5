//! Persisted Session Records
//!
//! The backend keeps the history of a session and returns it as an ordered
//! list of records. The core only ever reads these: they are converted into
//! timeline [`Message`]s during hydration and never written back.
//!
//! # Roles
//!
//! The backend speaks `"user"` and `"assistant"`. Any other role string is
//! kept verbatim as [`SessionRole::Other`] and rendered on the assistant side,
//! so one odd record cannot break loading a whole conversation. A missing,
//! `null` or non-string role is treated the same way.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::messages::{Message, MessageId, MessageStatus};

/// Who authored a persisted record
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionRole {
    /// User input
    User,
    /// Backend answer
    Assistant,
    /// Unrecognized role string
    Other(String),
}

impl SessionRole {
    /// Wire representation
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Other(role) => role,
        }
    }
}

impl From<String> for SessionRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            _ => Self::Other(value),
        }
    }
}

impl From<SessionRole> for String {
    fn from(value: SessionRole) -> Self {
        match value {
            SessionRole::Other(role) => role,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted message as returned by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Backend message ID
    pub id: String,
    /// Author role
    #[serde(default = "unknown_role", deserialize_with = "lenient_role")]
    pub role: SessionRole,
    /// Message content
    pub content: String,
    /// Creation time as sent by the backend (not interpreted)
    #[serde(default)]
    pub created_at: String,
}

impl SessionRecord {
    /// Create a record (mostly useful for tests and fixtures)
    pub fn new(id: impl Into<String>, role: SessionRole, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            created_at: String::new(),
        }
    }

    /// Timeline status this record hydrates to
    #[must_use]
    pub fn status(&self) -> MessageStatus {
        match self.role {
            SessionRole::User => MessageStatus::Local,
            SessionRole::Assistant | SessionRole::Other(_) => MessageStatus::Success,
        }
    }

    /// Convert into a timeline message keeping the backend id
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message::new(
            MessageId(self.id.clone()),
            self.status(),
            self.content.clone(),
        )
    }
}

fn unknown_role() -> SessionRole {
    SessionRole::Other(String::new())
}

fn lenient_role<'de, D>(deserializer: D) -> Result<SessionRole, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(role) => SessionRole::from(role),
        Value::Null => unknown_role(),
        other => SessionRole::Other(other.to_string()),
    })
}

/// An ordered list of persisted records for one session
pub type Session = Vec<SessionRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserialization() {
        let json = r#"[
            {"id": "m1", "role": "user", "content": "hey", "createdAt": "2024-05-01T10:00:00Z"},
            {"id": "m2", "role": "assistant", "content": "hello!", "createdAt": "2024-05-01T10:00:01Z"}
        ]"#;

        let records: Session = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].role, SessionRole::User);
        assert_eq!(records[0].created_at, "2024-05-01T10:00:00Z");
        assert_eq!(records[1].role, SessionRole::Assistant);
    }

    #[test]
    fn test_unknown_role_is_kept() {
        let record: SessionRecord =
            serde_json::from_str(r#"{"id": "x", "role": "system", "content": "note"}"#).unwrap();
        assert_eq!(record.role, SessionRole::Other("system".to_string()));
        assert_eq!(record.status(), MessageStatus::Success);
        assert_eq!(record.created_at, "");

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["role"], "system");
    }

    #[test]
    fn test_malformed_roles_do_not_fail_the_session() {
        let json = r#"[
            {"id": "a", "role": null, "content": "x", "createdAt": ""},
            {"id": "b", "content": "no role at all"},
            {"id": "c", "role": 7, "content": "numeric role"},
            {"id": "d", "role": "user", "content": "still fine"}
        ]"#;

        let records: Session = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].role, SessionRole::Other(String::new()));
        assert_eq!(records[1].role, SessionRole::Other(String::new()));
        assert_eq!(records[2].role, SessionRole::Other("7".to_string()));
        assert_eq!(records[3].role, SessionRole::User);

        let statuses: Vec<_> = records.iter().map(SessionRecord::status).collect();
        assert_eq!(
            statuses,
            vec![
                MessageStatus::Success,
                MessageStatus::Success,
                MessageStatus::Success,
                MessageStatus::Local,
            ]
        );
    }

    #[test]
    fn test_record_to_message() {
        let record = SessionRecord::new("m1", SessionRole::User, "hey");
        let message = record.to_message();
        assert_eq!(message.id.as_str(), "m1");
        assert_eq!(message.status, MessageStatus::Local);
        assert_eq!(message.text, "hey");
    }
}
