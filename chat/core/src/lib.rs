//! Chat Core - Headless Chat Orchestration
//!
//! This crate turns user input and asynchronous backend calls into an
//! ordered, consistent message timeline, independent of any UI framework.
//! A widget, a terminal, or a test harness renders the snapshots it hands out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Surfaces (render only)                 │
//! │        widget  ·  chat-console  ·  tests                     │
//! └───────────────┬───────────────────────────▲──────────────────┘
//!          submit / open_session          Timeline snapshots
//! ┌───────────────▼───────────────────────────┴──────────────────┐
//! │  ChatClient  (current session id, history loading)          │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ ChatSessionController  (timeline, exchange lifecycle)  │  │
//! │  │   ┌──────────────┐             ┌──────────────┐        │  │
//! │  │   │ RequestAgent │             │   Notifier   │        │  │
//! │  │   └──────┬───────┘             └──────────────┘        │  │
//! │  └──────────┼─────────────────────────────────────────────┘  │
//! │      ┌──────▼───────┐                                        │
//! │      │ ChatBackend  │  (HTTP: GET/POST api/chat/{session})   │
//! │      └──────────────┘                                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatSessionController`]: owns the timeline and runs exchanges
//! - [`RequestAgent`]: executes one request, reports exactly one outcome
//! - [`ChatClient`]: binds the controller to a backend and a session id
//! - [`Message`] / [`Timeline`]: what surfaces render
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use chat_core::{load_config, ChatClient, HttpChatBackend, TracingNotifier};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let backend = Arc::new(HttpChatBackend::from_config(&config)?);
//!     let mut client = ChatClient::new(&config, backend, Arc::new(TracingNotifier));
//!
//!     client.open_session(config.default_session_id.clone()).await?;
//!     client.submit("hello").await?;
//!
//!     for message in client.timeline().iter() {
//!         println!("{:?}: {}", message.origin(), message.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`agent`]: request execution with exactly-once outcomes
//! - [`backend`]: chat backend abstraction and HTTP implementation
//! - [`client`]: session binding and history loading
//! - [`config`]: layered configuration (defaults, TOML, environment)
//! - [`controller`]: the timeline and exchange lifecycle
//! - [`messages`]: timeline message types
//! - [`notify`]: transient notification sinks
//! - [`session`]: persisted session records

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod backend;
pub mod client;
pub mod config;
pub mod controller;
pub mod messages;
pub mod notify;
pub mod session;

// Re-exports for convenience
pub use agent::{AgentError, PendingReply, Reply, RequestAgent, RequestHandler};
pub use backend::{Answer, BackendError, ChatBackend, HttpChatBackend, Question};
pub use client::{ChatClient, SessionLoad};
pub use config::{
    default_config_path, load_config, load_config_from_path, load_config_with_env, ChatConfig,
    ChatToml, ConfigError, ConfigOverrides, ConfigSource,
};
pub use controller::{ChatError, ChatSessionController, Exchange, Timeline};
pub use messages::{Message, MessageId, MessageOrigin, MessageStatus, NotifyLevel, SessionId};
pub use notify::{ChannelNotifier, Notification, Notifier, TracingNotifier};
pub use session::{Session, SessionRecord, SessionRole};
