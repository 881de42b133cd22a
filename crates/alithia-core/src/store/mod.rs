//! Remote document store contract.
//!
//! The collection cache talks to the hosted document store only through the
//! `RemoteStore` trait. `FirestoreClient` (in `api`) implements it over REST;
//! `MemoryStore` implements it in-process for tests and offline use.

pub mod memory;

use std::future::Future;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::api::StoreError;
use crate::models::{Fields, RecordId};

pub use memory::{FailureKind, MemoryStore};

/// Length of ids generated for new documents.
const AUTO_ID_LENGTH: usize = 20;

const AUTO_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// A document as the store returns it: id plus raw fields.
///
/// Server timestamps are carried inside `fields` as RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: RecordId,
    pub fields: Fields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Fields to write, plus the names of fields the store should set to its
/// own request time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteRequest {
    pub fields: Fields,
    pub server_timestamps: Vec<String>,
}

impl WriteRequest {
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            server_timestamps: Vec::new(),
        }
    }

    pub fn with_server_timestamp(mut self, field: &str) -> Self {
        self.server_timestamps.push(field.to_string());
        self
    }
}

/// Operations the cache needs from the hosted document store.
pub trait RemoteStore: Send + Sync {
    /// Read a whole collection ordered by one field.
    fn list_all(
        &self,
        collection: &str,
        order_by: &str,
        direction: Direction,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    /// Read one document; `Ok(None)` when it does not exist.
    fn fetch(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Create a document and return its new id.
    fn insert(
        &self,
        collection: &str,
        write: &WriteRequest,
    ) -> impl Future<Output = Result<RecordId, StoreError>> + Send;

    /// Overwrite the given fields of an existing document.
    fn patch(
        &self,
        collection: &str,
        id: &RecordId,
        write: &WriteRequest,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Generate a random 20-character document id.
pub fn auto_id() -> RecordId {
    let mut rng = rand::thread_rng();
    let id: String = (0..AUTO_ID_LENGTH)
        .map(|_| AUTO_ID_ALPHABET[rng.gen_range(0..AUTO_ID_ALPHABET.len())] as char)
        .collect();
    RecordId::new(id)
}
