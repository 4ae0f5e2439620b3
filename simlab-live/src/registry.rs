//! Session registry: id → handle, with automatic cleanup.
//!
//! The registry is the only shared structure across sessions, guarded by
//! its own lock. A watcher task removes the entry when the owning actor
//! exits for any reason, including panics.

use crate::feed::MarketFeed;
use crate::persistence::SessionStore;
use crate::session::{spawn_session, SessionConfig, SessionError, SessionHandle, SessionMetrics};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session and register it. Fails on a duplicate id without
    /// spawning anything.
    pub fn start_session(
        &self,
        config: SessionConfig,
        feed: Arc<dyn MarketFeed>,
        store: Arc<dyn SessionStore>,
    ) -> Result<SessionHandle, SessionError> {
        let session_id = config.session_id.clone();
        {
            let sessions = self.sessions.lock().expect("registry lock poisoned");
            if sessions.contains_key(&session_id) {
                return Err(SessionError::DuplicateId(session_id));
            }
        }

        let (handle, join) = spawn_session(config, feed, store)?;
        self.sessions
            .lock()
            .expect("registry lock poisoned")
            .insert(session_id.clone(), handle.clone());

        // Watcher doubles as the finalizer: whenever the actor task ends —
        // clean stop, handle drop, or panic — the registry entry goes away.
        let sessions = Arc::clone(&self.sessions);
        let watched_id = session_id.clone();
        tokio::spawn(async move {
            if let Err(err) = join.await {
                tracing::error!(session = %watched_id, %err, "session task aborted");
            }
            sessions
                .lock()
                .expect("registry lock poisoned")
                .remove(&watched_id);
        });

        Ok(handle)
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .expect("registry lock poisoned")
            .get(session_id)
            .cloned()
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .lock()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().expect("registry lock poisoned").len()
    }

    /// Stop a session by id. The watcher removes the registry entry once
    /// the actor has terminated.
    pub async fn stop_session(&self, session_id: &str) -> Result<SessionMetrics, SessionError> {
        let handle = self
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        handle.stop().await
    }
}
