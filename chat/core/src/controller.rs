//! Chat Session Controller
//!
//! Owns the ordered message timeline and drives exchanges through a
//! [`RequestAgent`].
//!
//! # Exchange lifecycle
//!
//! ```text
//! submit("hello")
//!   ├─ append  Local   "hello"          (fresh id)
//!   ├─ append  Loading <placeholder>    (fresh id = correlation id)
//!   ├─ RequestAgent::dispatch("hello")
//!   └─ replace Loading with Success <reply>
//!                       or Error   <fallback>  + notification
//!                                  (also when the caller stops waiting)
//! ```
//!
//! Only one exchange may be open at a time. The open exchange is identified by
//! the id of its loading message; starting another exchange or hydrating while
//! it is open is rejected with [`ChatError::ExchangeInFlight`].
//!
//! # Snapshots
//!
//! The timeline is stored behind an `Arc` and updated copy-on-write. A
//! [`Timeline`] handed out by [`ChatSessionController::current_timeline`] or
//! through [`ChatSessionController::subscribe`] never changes after the fact.

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::agent::{AgentError, Reply, RequestAgent};
use crate::config::ChatConfig;
use crate::messages::{Message, MessageId, MessageStatus};
use crate::notify::{Notification, Notifier};
use crate::session::SessionRecord;

/// Errors from timeline operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Another exchange has not settled yet
    #[error("An exchange is already in flight (reply {0})")]
    ExchangeInFlight(MessageId),

    /// The exchange being settled is not the open one
    #[error("No open exchange with reply id {0}")]
    UnknownExchange(MessageId),
}

/// Immutable snapshot of the timeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timeline(Arc<Vec<Message>>);

impl Timeline {
    /// Find a message by id
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.0.iter().find(|m| &m.id == id)
    }

    /// The ids in timeline order
    pub fn ids(&self) -> impl Iterator<Item = &MessageId> {
        self.0.iter().map(|m| &m.id)
    }
}

impl Deref for Timeline {
    type Target = [Message];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// An exchange that has been started but not settled
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchange {
    /// Id of the user's message
    pub user_id: MessageId,
    /// Id of the pending assistant message, used as correlation id
    pub reply_id: MessageId,
    /// Text sent to the agent
    pub text: String,
}

/// Texts the controller writes into the timeline
#[derive(Clone, Debug)]
struct TimelineTexts {
    placeholder: String,
    fallback: String,
    welcome: Message,
}

/// Maintains the message timeline and coordinates it with a [`RequestAgent`]
pub struct ChatSessionController {
    agent: RequestAgent,
    notifier: Arc<dyn Notifier>,
    texts: TimelineTexts,
    timeline: Timeline,
    open_exchange: Option<MessageId>,
    remaining: Option<u32>,
    updates: watch::Sender<Timeline>,
}

impl std::fmt::Debug for ChatSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSessionController")
            .field("messages", &self.timeline.len())
            .field("open_exchange", &self.open_exchange)
            .finish_non_exhaustive()
    }
}

impl ChatSessionController {
    /// Create a controller whose timeline holds only the welcome message
    pub fn new(config: &ChatConfig, agent: RequestAgent, notifier: Arc<dyn Notifier>) -> Self {
        let texts = TimelineTexts {
            placeholder: config.placeholder.clone(),
            fallback: config.fallback.clone(),
            welcome: Message::new(
                config.welcome_id.clone(),
                MessageStatus::Success,
                config.welcome_text.clone(),
            ),
        };
        let timeline = Timeline(Arc::new(vec![texts.welcome.clone()]));
        let (updates, _) = watch::channel(timeline.clone());

        Self {
            agent,
            notifier,
            texts,
            timeline,
            open_exchange: None,
            remaining: None,
            updates,
        }
    }

    /// Read-only snapshot of the timeline
    #[must_use]
    pub fn current_timeline(&self) -> Timeline {
        self.timeline.clone()
    }

    /// Receive a new snapshot after every timeline change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Timeline> {
        self.updates.subscribe()
    }

    /// The agent executing requests
    #[must_use]
    pub fn agent(&self) -> &RequestAgent {
        &self.agent
    }

    /// Whether an exchange is open
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.open_exchange.is_some()
    }

    /// Correlation id of the open exchange
    #[must_use]
    pub fn open_exchange(&self) -> Option<&MessageId> {
        self.open_exchange.as_ref()
    }

    /// Last remaining-quota value reported by the backend
    #[must_use]
    pub fn remaining_quota(&self) -> Option<u32> {
        self.remaining
    }

    /// Submit user text and wait for the exchange to settle
    ///
    /// Blank text is ignored and returns `Ok(None)`. Otherwise returns the
    /// settled assistant message, whose status is `Success` or `Error`. A
    /// failed request is not an error of this method: it shows up as the
    /// fallback message and a notification.
    ///
    /// The request runs on its own task. If the returned future is dropped
    /// before the reply arrives, the exchange is settled as cancelled (the
    /// fallback message) and the controller accepts the next submission.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ExchangeInFlight`] if an exchange is already open.
    pub async fn submit(&mut self, text: &str) -> Result<Option<Message>, ChatError> {
        let Some(exchange) = self.begin(text)? else {
            return Ok(None);
        };

        let pending = self.agent.dispatch(exchange.text);
        let guard = ExchangeGuard {
            controller: self,
            reply_id: exchange.reply_id,
            armed: true,
        };
        let outcome = pending.await;
        guard.settle(outcome).map(Some)
    }

    /// Open an exchange: append the user's message and a loading message
    ///
    /// Returns `Ok(None)` without touching the timeline when `text` is blank.
    /// The caller must later pass the outcome to [`Self::settle`].
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ExchangeInFlight`] if an exchange is already open.
    pub fn begin(&mut self, text: &str) -> Result<Option<Exchange>, ChatError> {
        if text.trim().is_empty() {
            tracing::trace!("Ignoring blank submission");
            return Ok(None);
        }
        if let Some(open) = &self.open_exchange {
            return Err(ChatError::ExchangeInFlight(open.clone()));
        }

        let local = Message::local(text);
        let loading = Message::loading(self.texts.placeholder.clone());
        let exchange = Exchange {
            user_id: local.id.clone(),
            reply_id: loading.id.clone(),
            text: text.to_string(),
        };

        let messages = Arc::make_mut(&mut self.timeline.0);
        messages.push(local);
        messages.push(loading);
        self.open_exchange = Some(exchange.reply_id.clone());
        self.publish();

        tracing::debug!(
            user_id = %exchange.user_id,
            reply_id = %exchange.reply_id,
            "Exchange started"
        );
        Ok(Some(exchange))
    }

    /// Settle the open exchange with the agent's outcome
    ///
    /// Replaces the loading message with a `Success` message carrying the
    /// reply, or an `Error` message carrying the fallback text. Errors are
    /// forwarded to the notifier.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnknownExchange`] if `reply_id` is not the open
    /// exchange. The timeline is left untouched in that case.
    pub fn settle(
        &mut self,
        reply_id: &MessageId,
        outcome: Result<Reply, AgentError>,
    ) -> Result<Message, ChatError> {
        if self.open_exchange.as_ref() != Some(reply_id) {
            return Err(ChatError::UnknownExchange(reply_id.clone()));
        }

        let index = self
            .timeline
            .iter()
            .position(|m| &m.id == reply_id)
            .ok_or_else(|| ChatError::UnknownExchange(reply_id.clone()))?;

        let pending = &self.timeline[index];
        let settled = match outcome {
            Ok(reply) => {
                if reply.remaining.is_some() {
                    self.remaining = reply.remaining;
                }
                pending.succeed(reply.text)
            }
            Err(e) => {
                tracing::warn!(reply_id = %reply_id, error = %e, "Exchange failed, showing fallback");
                self.notifier.notify(Notification::error(e.to_string()));
                pending.fail(self.texts.fallback.clone())
            }
        }
        .ok_or_else(|| ChatError::UnknownExchange(reply_id.clone()))?;

        Arc::make_mut(&mut self.timeline.0)[index] = settled.clone();
        self.open_exchange = None;
        self.publish();

        tracing::debug!(reply_id = %reply_id, status = ?settled.status, "Exchange settled");
        Ok(settled)
    }

    /// Replace the timeline with the welcome message plus persisted records
    ///
    /// Records keep their order and ids. A record whose id is already used
    /// (by the welcome message or an earlier record) gets a deterministic
    /// `~n` suffix, so hydrating the same records twice yields the same
    /// timeline.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ExchangeInFlight`] if an exchange is open.
    pub fn hydrate(&mut self, records: &[SessionRecord]) -> Result<(), ChatError> {
        if let Some(open) = &self.open_exchange {
            return Err(ChatError::ExchangeInFlight(open.clone()));
        }

        let mut messages = Vec::with_capacity(records.len() + 1);
        let mut seen = HashSet::with_capacity(records.len() + 1);
        seen.insert(self.texts.welcome.id.clone());
        messages.push(self.texts.welcome.clone());

        for record in records {
            let mut message = record.to_message();
            if seen.contains(&message.id) {
                let rekeyed = unique_id(&message.id, &seen);
                tracing::warn!(id = %message.id, rekeyed = %rekeyed, "Duplicate record id in session");
                message.id = rekeyed;
            }
            seen.insert(message.id.clone());
            messages.push(message);
        }

        self.timeline = Timeline(Arc::new(messages));
        self.publish();

        tracing::debug!(records = records.len(), "Timeline hydrated");
        Ok(())
    }

    fn publish(&self) {
        self.updates.send_replace(self.timeline.clone());
    }
}

/// Settles the open exchange as cancelled unless it was settled normally
struct ExchangeGuard<'a> {
    controller: &'a mut ChatSessionController,
    reply_id: MessageId,
    armed: bool,
}

impl ExchangeGuard<'_> {
    fn settle(mut self, outcome: Result<Reply, AgentError>) -> Result<Message, ChatError> {
        self.armed = false;
        self.controller.settle(&self.reply_id, outcome)
    }
}

impl Drop for ExchangeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!(reply_id = %self.reply_id, "Submission dropped before the reply arrived");
        if let Err(e) = self
            .controller
            .settle(&self.reply_id, Err(AgentError::Cancelled))
        {
            tracing::warn!(error = %e, "Failed to settle cancelled exchange");
        }
    }
}

fn unique_id(base: &MessageId, taken: &HashSet<MessageId>) -> MessageId {
    (1..)
        .map(|n| MessageId(format!("{base}~{n}")))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(MessageId::new)
}
