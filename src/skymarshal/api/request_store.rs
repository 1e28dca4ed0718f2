//! In-memory request record store backing `POST /invoke` / `GET /status/{id}`
//! (C8, spec.md §6.2). A DynamoDB-backed store is an external interface
//! (spec.md §2 Out-of-scope); this trait lets one be substituted without
//! touching the handlers.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::skymarshal::model::RequestRecord;

#[derive(Debug, Clone)]
pub struct RequestStoreError(pub String);

impl std::fmt::Display for RequestStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request store error: {}", self.0)
    }
}

impl std::error::Error for RequestStoreError {}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn put(&self, record: RequestRecord) -> Result<(), RequestStoreError>;
    async fn get(&self, request_id: Uuid) -> Result<Option<RequestRecord>, RequestStoreError>;
    async fn update(&self, record: RequestRecord) -> Result<(), RequestStoreError>;
}

/// Keyed by request_id, matching the DynamoDB partition key in spec.md §6.2.
#[derive(Default)]
pub struct InMemoryRequestStore {
    records: RwLock<HashMap<Uuid, RequestRecord>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn put(&self, record: RequestRecord) -> Result<(), RequestStoreError> {
        let mut records = self.records.write().map_err(|_| RequestStoreError("poisoned lock".to_string()))?;
        records.insert(record.request_id, record);
        Ok(())
    }

    async fn get(&self, request_id: Uuid) -> Result<Option<RequestRecord>, RequestStoreError> {
        let records = self.records.read().map_err(|_| RequestStoreError("poisoned lock".to_string()))?;
        Ok(records.get(&request_id).cloned())
    }

    async fn update(&self, record: RequestRecord) -> Result<(), RequestStoreError> {
        self.put(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_request_id_is_none_not_error() {
        let store = InMemoryRequestStore::new();
        let result = store.get(Uuid::new_v4()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryRequestStore::new();
        let record = RequestRecord::new(Uuid::new_v4(), "flight EY123".to_string(), None, 3600);
        let id = record.request_id;
        store.put(record).await.unwrap();
        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.request_id, id);
    }
}
