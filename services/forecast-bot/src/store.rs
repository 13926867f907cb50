//! Session store - the single owner of every operator's session
//!
//! Sessions are held behind a per-session async mutex so that a poll tick and
//! an operator command for the same operator never interleave. The store's
//! own lock is never held while a session lock is awaited.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::poller::PollHandle;
use crate::session::ForecastSession;
use crate::types::OperatorId;

/// Shared handle to one session
pub type SharedSession = Arc<Mutex<ForecastSession>>;

struct SessionEntry {
    session_id: Uuid,
    session: SharedSession,
    /// Present iff the session is running
    poll: Option<PollHandle>,
    last_activity: Instant,
}

/// Process-lifetime mapping from operator to its active session
#[derive(Default)]
pub struct SessionStore {
    entries: RwLock<HashMap<OperatorId, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session, returning it together with the one it displaced
    ///
    /// The displaced session's poll is cancelled here. A tick of it may still
    /// hold its lock; locking the displaced session waits that tick out.
    pub async fn insert(&self, session: ForecastSession) -> (SharedSession, Option<SharedSession>) {
        let operator_id = session.operator_id.clone();
        let session_id = session.id;
        let shared = Arc::new(Mutex::new(session));

        let previous = self.entries.write().await.insert(
            operator_id.clone(),
            SessionEntry {
                session_id,
                session: Arc::clone(&shared),
                poll: None,
                last_activity: Instant::now(),
            },
        );

        let displaced = previous.map(|previous| {
            debug!(
                "Replaced session {} for operator {}",
                previous.session_id, operator_id
            );
            if let Some(poll) = &previous.poll {
                poll.cancel();
            }
            previous.session
        });

        (shared, displaced)
    }

    pub async fn get(&self, operator_id: &OperatorId) -> Option<SharedSession> {
        self.entries
            .read()
            .await
            .get(operator_id)
            .map(|e| Arc::clone(&e.session))
    }

    /// Session id currently stored for an operator
    pub async fn current_id(&self, operator_id: &OperatorId) -> Option<Uuid> {
        self.entries
            .read()
            .await
            .get(operator_id)
            .map(|e| e.session_id)
    }

    pub async fn contains(&self, operator_id: &OperatorId) -> bool {
        self.entries.read().await.contains_key(operator_id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Bind a poll task to the stored session
    ///
    /// Any poll already attached is cancelled first. If the stored session is
    /// no longer `session_id`, the new handle is cancelled and `false` returned.
    pub async fn attach_poll(
        &self,
        operator_id: &OperatorId,
        session_id: Uuid,
        handle: PollHandle,
    ) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(operator_id) {
            Some(entry) if entry.session_id == session_id => {
                if let Some(old) = entry.poll.replace(handle) {
                    old.cancel();
                }
                true
            }
            _ => {
                handle.cancel();
                false
            }
        }
    }

    /// Cancel the operator's poll task, keeping the session record
    pub async fn cancel_poll(&self, operator_id: &OperatorId) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(operator_id).and_then(|e| e.poll.take()) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn is_polling(&self, operator_id: &OperatorId) -> bool {
        self.entries
            .read()
            .await
            .get(operator_id)
            .and_then(|e| e.poll.as_ref())
            .is_some_and(|p| !p.is_cancelled())
    }

    /// Remove the operator's session, cancelling its poll task
    pub async fn remove(&self, operator_id: &OperatorId) -> Option<SharedSession> {
        let entry = self.entries.write().await.remove(operator_id)?;
        if let Some(poll) = &entry.poll {
            poll.cancel();
        }
        Some(entry.session)
    }

    /// Remove only if the stored session is still `session_id`
    pub async fn remove_if_current(&self, operator_id: &OperatorId, session_id: Uuid) -> bool {
        let mut entries = self.entries.write().await;
        let is_current = entries
            .get(operator_id)
            .is_some_and(|e| e.session_id == session_id);
        if is_current {
            if let Some(entry) = entries.remove(operator_id) {
                if let Some(poll) = &entry.poll {
                    poll.cancel();
                }
            }
        }
        is_current
    }

    /// Record operator activity for idle detection
    pub async fn touch(&self, operator_id: &OperatorId) {
        if let Some(entry) = self.entries.write().await.get_mut(operator_id) {
            entry.last_activity = Instant::now();
        }
    }

    /// Operators with no activity for longer than `timeout`
    pub async fn idle_operators(&self, timeout: Duration) -> Vec<OperatorId> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.last_activity.elapsed() > timeout)
            .map(|(id, _)| id.clone())
            .collect()
    }
}
