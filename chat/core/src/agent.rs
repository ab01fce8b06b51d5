//! Request Agent
//!
//! Wraps one asynchronous "ask" operation and reports exactly one terminal
//! outcome per invocation.
//!
//! # Outcome delivery
//!
//! There are no success/error callbacks. An invocation is either
//!
//! - awaited directly with [`RequestAgent::invoke`], which resolves to one
//!   `Result<Reply, AgentError>`, or
//! - spawned with [`RequestAgent::dispatch`], which returns a [`PendingReply`]
//!   backed by a single-fire `oneshot` channel.
//!
//! Either way the outcome can only be produced once. Errors from the handler,
//! including a panic inside it, are converted into [`AgentError`] with the
//! original error kept as the source.
//!
//! # Busy flag
//!
//! [`RequestAgent::is_busy`] is raised when the handler call starts and
//! lowered before the outcome is handed back, so a caller that has seen the
//! outcome never sees the agent busy on its behalf.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::backend::{Answer, BackendError};

/// Successful answer to a request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    /// Answer text shown in the timeline
    pub text: String,
    /// Remaining request quota, when the backend reports one
    pub remaining: Option<u32>,
}

impl Reply {
    /// A reply without quota information
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            remaining: None,
        }
    }
}

impl From<Answer> for Reply {
    fn from(answer: Answer) -> Self {
        Self {
            text: answer.answer,
            remaining: answer.remaining,
        }
    }
}

/// Why a request produced no reply
#[derive(Debug, Error)]
pub enum AgentError {
    /// The backend call failed
    #[error("Request failed: {0}")]
    Backend(#[from] BackendError),

    /// The request handler panicked
    #[error("Request handler panicked: {0}")]
    Panicked(String),

    /// The spawned request went away without reporting
    #[error("Request was dropped before completing")]
    Dropped,

    /// The caller stopped waiting for the reply
    #[error("Request was cancelled before the reply arrived")]
    Cancelled,
}

/// The injected asynchronous operation behind a [`RequestAgent`]
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Ask the backend and wait for the whole answer
    async fn request(&self, message: String) -> Result<Reply, BackendError>;
}

#[async_trait]
impl<F, Fut> RequestHandler for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, BackendError>> + Send + 'static,
{
    async fn request(&self, message: String) -> Result<Reply, BackendError> {
        (self)(message).await
    }
}

/// Decrements the in-flight count when dropped
struct BusyGuard(Arc<AtomicUsize>);

impl BusyGuard {
    fn enter(in_flight: &Arc<AtomicUsize>) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Executes requests through an injected [`RequestHandler`]
#[derive(Clone)]
pub struct RequestAgent {
    handler: Arc<dyn RequestHandler>,
    in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for RequestAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAgent")
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl RequestAgent {
    /// Create an agent around a handler
    pub fn new<H>(handler: H) -> Self
    where
        H: RequestHandler + 'static,
    {
        Self::from_arc(Arc::new(handler))
    }

    /// Create an agent around a shared handler
    #[must_use]
    pub fn from_arc(handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            handler,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether a request is currently in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Run one request to completion
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Backend`] when the handler fails and
    /// [`AgentError::Panicked`] when it panics.
    pub async fn invoke(&self, message: impl Into<String>) -> Result<Reply, AgentError> {
        let guard = BusyGuard::enter(&self.in_flight);
        let outcome = run(Arc::clone(&self.handler), message.into()).await;
        drop(guard);
        outcome
    }

    /// Spawn one request and return its single-fire completion
    ///
    /// The agent is busy from this call until the outcome is sent. Must be
    /// called from within a tokio runtime.
    #[must_use]
    pub fn dispatch(&self, message: impl Into<String>) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        let guard = BusyGuard::enter(&self.in_flight);
        let handler = Arc::clone(&self.handler);
        let message = message.into();

        tokio::spawn(async move {
            let outcome = run(handler, message).await;
            drop(guard);
            if tx.send(outcome).is_err() {
                tracing::debug!("Request outcome discarded, receiver dropped");
            }
        });

        PendingReply { rx }
    }
}

async fn run(handler: Arc<dyn RequestHandler>, message: String) -> Result<Reply, AgentError> {
    tracing::debug!(chars = message.chars().count(), "Request started");

    let outcome = match AssertUnwindSafe(handler.request(message))
        .catch_unwind()
        .await
    {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(e)) => Err(AgentError::Backend(e)),
        Err(payload) => Err(AgentError::Panicked(panic_message(payload.as_ref()))),
    };

    match &outcome {
        Ok(reply) => tracing::debug!(remaining = ?reply.remaining, "Request succeeded"),
        Err(e) => tracing::debug!(error = %e, "Request failed"),
    }
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Completion of a dispatched request
///
/// Resolves exactly once. If the request task disappears without reporting,
/// resolves to [`AgentError::Dropped`].
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<Result<Reply, AgentError>>,
}

impl Future for PendingReply {
    type Output = Result<Reply, AgentError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(AgentError::Dropped)))
    }
}
