//! In-memory session history store (C8, spec.md §4.8/§6.3), ported from
//! `src/api/session_manager.py`. History is an append-only list sorted by
//! timestamp descending; expiry is the store's TTL, no explicit cleanup code.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::skymarshal::model::SessionRecord;

#[derive(Debug, Clone)]
pub struct SessionStoreError(pub String);

impl std::fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session store error: {}", self.0)
    }
}

impl std::error::Error for SessionStoreError {}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns a fresh session identifier; does not write a record.
    fn create_session(&self) -> Uuid;

    async fn save_interaction(&self, record: SessionRecord) -> Result<(), SessionStoreError>;

    /// Most recent `limit` interactions for a session, newest first.
    async fn get_history(&self, session_id: Uuid, limit: usize) -> Result<Vec<SessionRecord>, SessionStoreError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    by_session: RwLock<HashMap<Uuid, Vec<SessionRecord>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn create_session(&self) -> Uuid {
        Uuid::new_v4()
    }

    async fn save_interaction(&self, record: SessionRecord) -> Result<(), SessionStoreError> {
        let mut by_session = self.by_session.write().map_err(|_| SessionStoreError("poisoned lock".to_string()))?;
        by_session.entry(record.session_id).or_default().push(record);
        Ok(())
    }

    async fn get_history(&self, session_id: Uuid, limit: usize) -> Result<Vec<SessionRecord>, SessionStoreError> {
        let by_session = self.by_session.read().map_err(|_| SessionStoreError("poisoned lock".to_string()))?;
        let mut interactions = by_session.get(&session_id).cloned().unwrap_or_default();
        interactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        interactions.truncate(limit);
        Ok(interactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skymarshal::model::RequestStatus;

    fn record(session_id: Uuid, timestamp: i64) -> SessionRecord {
        SessionRecord {
            session_id,
            timestamp,
            request_id: Uuid::new_v4(),
            prompt: "p".to_string(),
            response: None,
            status: RequestStatus::Complete,
            execution_time_ms: None,
            error_message: None,
            ttl: 0,
        }
    }

    #[tokio::test]
    async fn history_is_sorted_descending_by_timestamp() {
        let store = InMemorySessionStore::new();
        let session_id = Uuid::new_v4();
        store.save_interaction(record(session_id, 100)).await.unwrap();
        store.save_interaction(record(session_id, 300)).await.unwrap();
        store.save_interaction(record(session_id, 200)).await.unwrap();

        let history = store.get_history(session_id, 50).await.unwrap();
        let timestamps: Vec<i64> = history.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn history_is_truncated_to_limit() {
        let store = InMemorySessionStore::new();
        let session_id = Uuid::new_v4();
        for i in 0..5 {
            store.save_interaction(record(session_id, i)).await.unwrap();
        }
        let history = store.get_history(session_id, 2).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn unknown_session_returns_empty_not_error() {
        let store = InMemorySessionStore::new();
        let history = store.get_history(Uuid::new_v4(), 50).await.unwrap();
        assert!(history.is_empty());
    }
}
