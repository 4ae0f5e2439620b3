//! Best-effort session snapshot persistence.
//!
//! Stores are called asynchronously off the event-handling path; a failure
//! is logged by the caller and never aborts a session.

use crate::session::SessionStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use simlab_core::domain::ExecutedTrade;
use simlab_core::ledger::Ledger;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the persistence store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("session '{0}' not found")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

/// A lossless checkpoint of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    /// Opaque reference to the strategy definition.
    pub strategy: String,
    pub symbol: String,
    pub status: SessionStatus,
    pub ledger: Ledger,
    pub trades: Vec<ExecutedTrade>,
    pub last_price: Option<f64>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub saved_at: DateTime<Utc>,
}

/// Durable store contract, called best-effort by the session actor.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;
    async fn update(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;
    async fn load(&self, session_id: &str) -> Result<SessionSnapshot, StoreError>;
    /// Persist the final state when a session stops.
    async fn finalize(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;
}

/// Store that keeps nothing. Useful when durability is not wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

#[async_trait]
impl SessionStore for NullStore {
    async fn create(&self, _snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        Ok(())
    }

    async fn update(&self, _snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<SessionSnapshot, StoreError> {
        Err(StoreError::NotFound(session_id.to_string()))
    }

    async fn finalize(&self, _snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        Ok(())
    }
}

/// One JSON file per session under a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        // Session ids may contain separators; keep file names flat.
        let safe: String = session_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    async fn write(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        tokio::fs::write(self.path_for(&snapshot.session_id), json)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn create(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        self.write(snapshot).await
    }

    async fn update(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        self.write(snapshot).await
    }

    async fn load(&self, session_id: &str) -> Result<SessionSnapshot, StoreError> {
        let path = self.path_for(session_id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| StoreError::NotFound(session_id.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Storage(e.to_string()))
    }

    async fn finalize(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        self.write(snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simlab_core::ledger::PositionSizing;

    fn snapshot(id: &str) -> SessionSnapshot {
        SessionSnapshot {
            session_id: id.to_string(),
            strategy: "strategy-ref-1".into(),
            symbol: "BTC/USD".into(),
            status: SessionStatus::Active,
            ledger: Ledger::new(10_000.0, PositionSizing::FixedQuantity { quantity: 0.1 })
                .unwrap(),
            trades: Vec::new(),
            last_price: Some(50_000.0),
            last_timestamp: Some(Utc::now()),
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn json_store_round_trips_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let snap = snapshot("sess-1");
        store.create(&snap).await.unwrap();
        let loaded = store.load("sess-1").await.unwrap();
        assert_eq!(snap, loaded);

        let mut updated = snap.clone();
        updated.status = SessionStatus::Paused;
        store.update(&updated).await.unwrap();
        assert_eq!(store.load("sess-1").await.unwrap().status, SessionStatus::Paused);
    }

    #[tokio::test]
    async fn json_store_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert_eq!(
            store.load("nope").await.unwrap_err(),
            StoreError::NotFound("nope".into())
        );
    }

    #[tokio::test]
    async fn null_store_accepts_everything_and_loads_nothing() {
        let store = NullStore;
        let snap = snapshot("sess-2");
        store.create(&snap).await.unwrap();
        store.finalize(&snap).await.unwrap();
        assert!(store.load("sess-2").await.is_err());
    }

    #[tokio::test]
    async fn path_sanitization_keeps_files_flat() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let snap = snapshot("../../evil/session");
        store.create(&snap).await.unwrap();
        // File lands inside the store directory, not outside it.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
