//! In-process document store.
//!
//! Behaves like the hosted store for the operations the cache uses:
//! generated ids, request-time stamps, descending reads that skip documents
//! missing the order field. Failures can be injected to exercise the
//! cache's error paths.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;

use super::{auto_id, Direction, Document, RemoteStore, WriteRequest};
use crate::api::StoreError;
use crate::models::{Fields, RecordId};

/// Kind of failure to inject into the next store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Offline,
    PermissionDenied,
}

impl FailureKind {
    fn to_error(self, collection: &str) -> StoreError {
        match self {
            FailureKind::Offline => StoreError::Unavailable("store is offline".to_string()),
            FailureKind::PermissionDenied => {
                StoreError::AccessDenied(format!("missing or insufficient permissions on {}", collection))
            }
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Document>>,
    offline: bool,
    fail_next: Option<FailureKind>,
    read_only: HashSet<String>,
    queued_ids: VecDeque<RecordId>,
    last_stamp: Option<DateTime<Utc>>,
}

impl MemoryState {
    fn check(&mut self, collection: &str, write: bool) -> Result<(), StoreError> {
        if let Some(kind) = self.fail_next.take() {
            return Err(kind.to_error(collection));
        }
        if self.offline {
            return Err(FailureKind::Offline.to_error(collection));
        }
        if write && self.read_only.contains(collection) {
            return Err(FailureKind::PermissionDenied.to_error(collection));
        }
        Ok(())
    }

    /// Request time, strictly increasing so back-to-back writes still order.
    fn next_stamp(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_stamp {
            if now <= last {
                now = last + Duration::nanoseconds(1);
            }
        }
        self.last_stamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    fn apply_stamps(&mut self, fields: &mut Fields, write: &WriteRequest) {
        for name in &write.server_timestamps {
            let stamp = self.next_stamp();
            fields.insert(name.clone(), Value::String(stamp));
        }
    }
}

/// Cheap to clone; clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a document exactly as given, without stamping.
    pub fn seed(&self, collection: &str, fields: Fields) -> RecordId {
        let id = auto_id();
        self.seed_with_id(collection, id.clone(), fields);
        id
    }

    pub fn seed_with_id(&self, collection: &str, id: RecordId, fields: Fields) {
        self.state()
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Document { id, fields });
    }

    /// Every call fails with `Unavailable` while offline.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Fail the next call, whatever it is.
    pub fn fail_next(&self, kind: FailureKind) {
        self.state().fail_next = Some(kind);
    }

    /// Reject writes to `collection` with `AccessDenied`.
    pub fn set_read_only(&self, collection: &str) {
        self.state().read_only.insert(collection.to_string());
    }

    /// Use `id` for the next insert instead of generating one.
    pub fn queue_id(&self, id: impl Into<RecordId>) {
        self.state().queued_ids.push_back(id.into());
    }

    /// Snapshot of the stored documents, in storage order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.state()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get(&self, collection: &str, id: &RecordId) -> Option<Document> {
        self.state()
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| &d.id == id).cloned())
    }
}

/// Order two field values the way the store sorts them.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

impl RemoteStore for MemoryStore {
    async fn list_all(
        &self,
        collection: &str,
        order_by: &str,
        direction: Direction,
    ) -> Result<Vec<Document>, StoreError> {
        let mut state = self.state();
        state.check(collection, false)?;

        let mut docs: Vec<Document> = state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| d.fields.contains_key(order_by))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        docs.sort_by(|a, b| {
            let ordering = compare_values(a.fields.get(order_by), b.fields.get(order_by));
            match direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        });
        Ok(docs)
    }

    async fn fetch(&self, collection: &str, id: &RecordId) -> Result<Option<Document>, StoreError> {
        let mut state = self.state();
        state.check(collection, false)?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| &d.id == id).cloned()))
    }

    async fn insert(&self, collection: &str, write: &WriteRequest) -> Result<RecordId, StoreError> {
        let mut state = self.state();
        state.check(collection, true)?;

        let mut fields = write.fields.clone();
        state.apply_stamps(&mut fields, write);

        let queued = state.queued_ids.pop_front();
        let docs = state.collections.entry(collection.to_string()).or_default();
        let mut id = queued.unwrap_or_else(auto_id);
        while docs.iter().any(|d| d.id == id) {
            id = auto_id();
        }
        docs.push(Document {
            id: id.clone(),
            fields,
        });
        Ok(id)
    }

    async fn patch(
        &self,
        collection: &str,
        id: &RecordId,
        write: &WriteRequest,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        state.check(collection, true)?;

        let mut stamped = write.fields.clone();
        state.apply_stamps(&mut stamped, write);

        let doc = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| &d.id == id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
        for (key, value) in stamped {
            doc.fields.insert(key, value);
        }
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &RecordId) -> Result<(), StoreError> {
        let mut state = self.state();
        state.check(collection, true)?;
        if let Some(docs) = state.collections.get_mut(collection) {
            docs.retain(|d| &d.id != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_list_all_orders_newest_first() {
        let store = MemoryStore::new();
        let first = store
            .insert("updates", &WriteRequest::new(fields(json!({ "content": "one" }))).with_server_timestamp("createdAt"))
            .await
            .unwrap();
        let second = store
            .insert("updates", &WriteRequest::new(fields(json!({ "content": "two" }))).with_server_timestamp("createdAt"))
            .await
            .unwrap();

        let docs = store.list_all("updates", "createdAt", Direction::Descending).await.unwrap();
        let ids: Vec<RecordId> = docs.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn test_list_all_skips_documents_without_order_field() {
        let store = MemoryStore::new();
        store.seed("lore", fields(json!({ "title": "Unstamped" })));
        store.seed("lore", fields(json!({ "title": "Stamped", "createdAt": "2026-01-01T00:00:00Z" })));

        let docs = store.list_all("lore", "createdAt", Direction::Descending).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].fields["title"], "Stamped");
    }

    #[tokio::test]
    async fn test_fail_next_only_fails_once() {
        let store = MemoryStore::new();
        store.fail_next(FailureKind::Offline);

        let err = store.list_all("lore", "createdAt", Direction::Descending).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.list_all("lore", "createdAt", Direction::Descending).await.is_ok());
    }

    #[tokio::test]
    async fn test_read_only_collection_rejects_writes() {
        let store = MemoryStore::new();
        store.set_read_only("changelog");

        let err = store
            .insert("changelog", &WriteRequest::new(fields(json!({ "summary": "x" }))))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AccessDenied(_)));
        assert!(store.list_all("changelog", "createdAt", Direction::Descending).await.is_ok());
    }

    #[tokio::test]
    async fn test_patch_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .patch("lore", &RecordId::from("nope"), &WriteRequest::new(Fields::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
