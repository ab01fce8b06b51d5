//! Chat Client
//!
//! Binds a [`ChatSessionController`] to a [`ChatBackend`] and one current
//! session id. Opening a session fetches its history and hydrates the
//! timeline; every submission posts to whichever session is current.
//!
//! There is exactly one live conversation per client. Switching sessions
//! replaces the timeline; it does not keep the previous one around.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::agent::{Reply, RequestAgent, RequestHandler};
use crate::backend::{BackendError, ChatBackend, Question};
use crate::config::ChatConfig;
use crate::controller::{ChatError, ChatSessionController, Timeline};
use crate::messages::{Message, SessionId};
use crate::notify::{Notification, Notifier};

/// Result of opening a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionLoad {
    /// History was fetched and hydrated
    Restored {
        /// Number of persisted records
        records: usize,
    },
    /// History could not be fetched; the timeline holds only the welcome message
    Unavailable,
}

/// Request handler that posts questions to the current session
struct SessionRequester {
    backend: Arc<dyn ChatBackend>,
    session: Arc<RwLock<SessionId>>,
}

#[async_trait]
impl RequestHandler for SessionRequester {
    async fn request(&self, message: String) -> Result<Reply, BackendError> {
        let session_id = self.session.read().clone();
        let answer = self
            .backend
            .ask(&session_id, &Question::new(message))
            .await?;
        Ok(Reply::from(answer))
    }
}

/// A conversation against a chat backend
pub struct ChatClient {
    backend: Arc<dyn ChatBackend>,
    notifier: Arc<dyn Notifier>,
    session: Arc<RwLock<SessionId>>,
    controller: ChatSessionController,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("backend", &self.backend.name())
            .field("session", &*self.session.read())
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Create a client bound to the configured default session
    ///
    /// The session is not fetched until [`Self::open_session`] is called.
    pub fn new(
        config: &ChatConfig,
        backend: Arc<dyn ChatBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let session = Arc::new(RwLock::new(config.default_session_id.clone()));
        let agent = RequestAgent::new(SessionRequester {
            backend: Arc::clone(&backend),
            session: Arc::clone(&session),
        });
        let controller = ChatSessionController::new(config, agent, Arc::clone(&notifier));

        Self {
            backend,
            notifier,
            session,
            controller,
        }
    }

    /// The session questions are posted to
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session.read().clone()
    }

    /// The underlying controller
    #[must_use]
    pub fn controller(&self) -> &ChatSessionController {
        &self.controller
    }

    /// The underlying controller, for driving an exchange in steps
    ///
    /// Use [`ChatSessionController::begin`], [`RequestAgent::dispatch`] and
    /// [`ChatSessionController::settle`] when the surface must stay responsive
    /// while a request is in flight.
    pub fn controller_mut(&mut self) -> &mut ChatSessionController {
        &mut self.controller
    }

    /// Read-only snapshot of the timeline
    #[must_use]
    pub fn timeline(&self) -> Timeline {
        self.controller.current_timeline()
    }

    /// Receive a new snapshot after every timeline change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Timeline> {
        self.controller.subscribe()
    }

    /// Make `session_id` current and hydrate its history
    ///
    /// A failed fetch does not fail the call: the error is passed to the
    /// notifier and the timeline is reset to the welcome message.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ExchangeInFlight`] if an exchange is open.
    pub async fn open_session(&mut self, session_id: SessionId) -> Result<SessionLoad, ChatError> {
        if let Some(open) = self.controller.open_exchange() {
            return Err(ChatError::ExchangeInFlight(open.clone()));
        }

        tracing::info!(session_id = %session_id, backend = self.backend.name(), "Opening session");

        let fetched = self.backend.fetch_session(&session_id).await;
        *self.session.write() = session_id.clone();

        match fetched {
            Ok(records) => {
                self.controller.hydrate(&records)?;
                Ok(SessionLoad::Restored {
                    records: records.len(),
                })
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to load session history");
                self.notifier.notify(Notification::warning(format!(
                    "Could not load conversation history: {e}"
                )));
                self.controller.hydrate(&[])?;
                Ok(SessionLoad::Unavailable)
            }
        }
    }

    /// Submit user text to the current session
    ///
    /// See [`ChatSessionController::submit`].
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ExchangeInFlight`] if an exchange is already open.
    pub async fn submit(&mut self, text: &str) -> Result<Option<Message>, ChatError> {
        self.controller.submit(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Answer;
    use crate::messages::MessageStatus;
    use crate::notify::ChannelNotifier;
    use crate::session::{Session, SessionRecord, SessionRole};
    use parking_lot::Mutex;

    /// Backend that records calls and serves canned history
    #[derive(Default)]
    struct RecordingBackend {
        history: Option<Session>,
        asked: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatBackend for RecordingBackend {
        fn name(&self) -> &str {
            "Recording"
        }

        async fn fetch_session(&self, _session_id: &SessionId) -> Result<Session, BackendError> {
            self.history
                .clone()
                .ok_or_else(|| BackendError::Other("history unavailable".to_string()))
        }

        async fn ask(
            &self,
            session_id: &SessionId,
            question: &Question,
        ) -> Result<Answer, BackendError> {
            self.asked
                .lock()
                .push((session_id.to_string(), question.question.clone()));
            Ok(Answer {
                answer: format!("re: {}", question.question),
                remaining: Some(10),
            })
        }
    }

    #[tokio::test]
    async fn test_open_session_hydrates() {
        let backend = Arc::new(RecordingBackend {
            history: Some(vec![SessionRecord::new("m1", SessionRole::User, "hey")]),
            ..Default::default()
        });
        let (notifier, mut rx) = ChannelNotifier::new();
        let mut client = ChatClient::new(&ChatConfig::default(), backend, Arc::new(notifier));

        let load = client.open_session(SessionId::new("5")).await.unwrap();
        assert_eq!(load, SessionLoad::Restored { records: 1 });
        assert_eq!(client.session_id().as_str(), "5");
        assert_eq!(client.timeline().len(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_open_session_degrades_on_fetch_failure() {
        let backend = Arc::new(RecordingBackend::default());
        let (notifier, mut rx) = ChannelNotifier::new();
        let mut client = ChatClient::new(&ChatConfig::default(), backend, Arc::new(notifier));

        let load = client.open_session(SessionId::new("5")).await.unwrap();
        assert_eq!(load, SessionLoad::Unavailable);
        assert_eq!(client.timeline().len(), 1);
        assert_eq!(client.session_id().as_str(), "5");
        assert!(rx.try_recv().unwrap().message.contains("history unavailable"));
    }

    #[tokio::test]
    async fn test_submit_posts_to_current_session() {
        let backend = Arc::new(RecordingBackend {
            history: Some(Vec::new()),
            ..Default::default()
        });
        let (notifier, _rx) = ChannelNotifier::new();
        let mut client = ChatClient::new(
            &ChatConfig::default(),
            Arc::clone(&backend) as Arc<dyn ChatBackend>,
            Arc::new(notifier),
        );

        client.submit("first").await.unwrap();
        client.open_session(SessionId::new("2")).await.unwrap();
        let settled = client.submit("second").await.unwrap().unwrap();

        assert_eq!(settled.status, MessageStatus::Success);
        assert_eq!(settled.text, "re: second");
        assert_eq!(client.controller().remaining_quota(), Some(10));
        assert_eq!(
            *backend.asked.lock(),
            vec![
                ("1".to_string(), "first".to_string()),
                ("2".to_string(), "second".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_open_session_rejected_while_in_flight() {
        let backend = Arc::new(RecordingBackend::default());
        let (notifier, _rx) = ChannelNotifier::new();
        let mut client = ChatClient::new(&ChatConfig::default(), backend, Arc::new(notifier));

        let exchange = client.controller_mut().begin("pending").unwrap().unwrap();
        let err = client.open_session(SessionId::new("9")).await.unwrap_err();
        assert_eq!(err, ChatError::ExchangeInFlight(exchange.reply_id.clone()));
        assert_eq!(client.session_id().as_str(), "1");
        assert_eq!(client.timeline().len(), 3);
    }

    #[tokio::test]
    async fn test_dispatched_exchange_settles() {
        let backend = Arc::new(RecordingBackend::default());
        let (notifier, _rx) = ChannelNotifier::new();
        let mut client = ChatClient::new(&ChatConfig::default(), backend, Arc::new(notifier));

        let exchange = client.controller_mut().begin("hello").unwrap().unwrap();
        let pending = client.controller().agent().dispatch(exchange.text.clone());
        let outcome = pending.await;
        let settled = client
            .controller_mut()
            .settle(&exchange.reply_id, outcome)
            .unwrap();

        assert_eq!(settled.text, "re: hello");
        assert!(!client.controller().is_busy());
    }
}
