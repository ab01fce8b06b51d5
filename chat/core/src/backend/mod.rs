//! Chat Backend Integration
//!
//! Access to the chat service through a common trait interface.
//!
//! # Available Backends
//!
//! - **HTTP**: JSON over HTTP (default)
//!
//! # Usage
//!
//! ```ignore
//! use chat_core::backend::{ChatBackend, HttpChatBackend, Question};
//!
//! let backend = HttpChatBackend::new("http://localhost:8080", Duration::from_secs(30))?;
//! let answer = backend.ask(&session_id, &Question::new("Hello!")).await?;
//! ```

mod http;
mod traits;

pub use http::HttpChatBackend;
pub use traits::{Answer, BackendError, ChatBackend, Question};
