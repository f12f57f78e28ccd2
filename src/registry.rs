//! Session registry
//!
//! The set of sessions currently connected to the server, in accept order.
//! Shared between the accept loop, every session's receive loop and the
//! server's broadcast/stop operations.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::session::ClientSession;
use crate::types::SessionId;

/// Mutex-guarded list of live sessions
///
/// Fan-out never iterates under the lock: callers take a [`snapshot`] and
/// send after the lock is released, so a join or leave during a broadcast
/// neither blocks on the broadcast nor disturbs it.
///
/// [`snapshot`]: SessionRegistry::snapshot
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<Vec<Arc<ClientSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session
    pub async fn insert(&self, session: Arc<ClientSession>) {
        self.sessions.lock().await.push(session);
    }

    /// Unregister a session by identity
    ///
    /// Returns `None` if it was already gone (e.g. removed by `stop()`).
    pub async fn remove(&self, id: SessionId) -> Option<Arc<ClientSession>> {
        let mut sessions = self.sessions.lock().await;
        let index = sessions.iter().position(|s| s.id() == id)?;
        Some(sessions.remove(index))
    }

    /// Point-in-time copy of the registered sessions
    pub async fn snapshot(&self) -> Vec<Arc<ClientSession>> {
        self.sessions.lock().await.clone()
    }

    /// Remove and return every session
    pub async fn drain(&self) -> Vec<Arc<ClientSession>> {
        std::mem::take(&mut *self.sessions.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
