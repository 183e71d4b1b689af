//! Navigator session registry
//!
//! Keeps live navigator sessions addressable by the id embedded in their
//! controls and runs one idle watchdog per session. Transport-agnostic: the
//! Telegram adapter and the tests use the same registry.

use super::{NavAction, NavError, NavOutcome, NavTransport, NavigatorSession, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

type SharedSession<T> = Arc<Mutex<NavigatorSession<T>>>;

/// Live sessions plus their watchdog cancellation tokens
pub struct SessionRegistry<T: NavTransport> {
    sessions: RwLock<HashMap<SessionId, SharedSession<T>>>,
    cancellation_tokens: RwLock<HashMap<SessionId, CancellationToken>>,
}

impl<T: NavTransport> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NavTransport> SessionRegistry<T> {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            cancellation_tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Register an opened session and start its idle watchdog.
    pub async fn insert(self: &Arc<Self>, session: NavigatorSession<T>) -> SessionId {
        let id = session.id().clone();
        let shared = Arc::new(Mutex::new(session));
        let token = CancellationToken::new();

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(id.clone(), shared.clone());
        }

        {
            let mut tokens = self.cancellation_tokens.write().await;
            tokens.insert(id.clone(), token.clone());
        }

        spawn_watchdog(Arc::downgrade(self), id.clone(), shared, token);
        id
    }

    /// Get session if exists
    pub async fn get(&self, id: &SessionId) -> Option<SharedSession<T>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Check if session exists
    pub async fn contains(&self, id: &SessionId) -> bool {
        let sessions = self.sessions.read().await;
        sessions.contains_key(id)
    }

    /// Route a control press to its session.
    ///
    /// Presses for unknown sessions (expired, stopped, or from before a
    /// restart) report `Closed` without touching any transport.
    ///
    /// # Errors
    ///
    /// Transport failures from the session.
    pub async fn dispatch(
        &self,
        id: &SessionId,
        action: NavAction,
    ) -> Result<NavOutcome, NavError> {
        let Some(session) = self.get(id).await else {
            debug!(session = %id, "Press for unknown navigator session");
            return Ok(NavOutcome::Closed);
        };

        let (outcome, closed) = {
            let mut session = session.lock().await;
            let outcome = session.handle_action(action).await;
            (outcome, session.is_closed())
        };

        if closed {
            self.remove(id).await;
        }
        outcome
    }

    /// Remove a session and stop its watchdog
    pub async fn remove(&self, id: &SessionId) {
        {
            let mut sessions = self.sessions.write().await;
            sessions.remove(id);
        }

        {
            let mut tokens = self.cancellation_tokens.write().await;
            if let Some(token) = tokens.remove(id) {
                token.cancel();
            }
        }
    }

    /// Get the number of live sessions
    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Check if registry is empty
    pub async fn is_empty(&self) -> bool {
        let sessions = self.sessions.read().await;
        sessions.is_empty()
    }
}

/// Fire `on_timeout` once the session has been idle for its full timeout.
///
/// The session lock is taken before deciding, so an action that is still
/// fetching or rendering always completes first.
fn spawn_watchdog<T: NavTransport>(
    registry: Weak<SessionRegistry<T>>,
    id: SessionId,
    session: SharedSession<T>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let deadline = {
                let session = session.lock().await;
                if session.is_closed() {
                    break;
                }
                session.last_activity() + session.timeout()
            };

            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep_until(deadline) => {}
            }

            let mut session = session.lock().await;
            if session.is_closed() {
                break;
            }
            if session.idle_for() >= session.timeout() {
                session.on_timeout().await;
                drop(session);
                info!(session = %id, "Idle navigator evicted");
                if let Some(registry) = registry.upgrade() {
                    registry.remove(&id).await;
                }
                break;
            }
        }
    });
}
