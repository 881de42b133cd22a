//! Audit entries written alongside primary writes.
//!
//! Entries are written on a spawned task: a slow or failing changelog write
//! never delays or rolls back the write it describes. Failures are logged.

use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::auth::Viewer;
use crate::models::Fields;
use crate::store::{RemoteStore, WriteRequest};
use crate::utils::{capitalize, truncate_chars};

pub const CHANGELOG_COLLECTION: &str = "changelog";

/// Characters of the record's preview field copied into the entry.
const PREVIEW_CHARS: usize = 120;

const CREATED_FIELD: &str = "createdAt";

pub struct ChangeLog<S> {
    store: S,
    author: Fields,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl<S> ChangeLog<S>
where
    S: RemoteStore + Clone + 'static,
{
    pub fn new(store: S, viewer: &Viewer) -> Self {
        Self {
            store,
            author: viewer.author_fields(),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queue an entry for writing and return immediately.
    pub fn record(&self, kind: &str, summary: &str, preview: &str) {
        let mut fields = Fields::new();
        fields.insert("type".to_string(), Value::String(kind.to_string()));
        fields.insert("summary".to_string(), Value::String(summary.to_string()));
        fields.insert(
            "preview".to_string(),
            Value::String(truncate_chars(preview, PREVIEW_CHARS)),
        );
        fields.extend(self.author.clone());
        let write = WriteRequest::new(fields).with_server_timestamp(CREATED_FIELD);

        let store = self.store.clone();
        let kind = kind.to_string();
        let handle = tokio::spawn(async move {
            match store.insert(CHANGELOG_COLLECTION, &write).await {
                Ok(id) => debug!(kind = %kind, id = %id, "Changelog entry written"),
                Err(e) => warn!(kind = %kind, error = %e, "Failed to write changelog entry"),
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// `<noun>_added` / "New <noun> added: <title>"
    pub fn record_added(&self, noun: &str, title: &str, preview: &str) {
        let label = noun.replace('_', " ");
        self.record(
            &format!("{}_added", noun),
            &format!("New {} added: {}", label, title),
            preview,
        );
    }

    /// `<noun>_edited` / "<Noun> updated: <title>"
    pub fn record_edited(&self, noun: &str, title: &str, preview: &str) {
        let label = capitalize(&noun.replace('_', " "));
        self.record(
            &format!("{}_edited", noun),
            &format!("{} updated: {}", label, title),
            preview,
        );
    }

    /// Wait for every queued entry to finish writing.
    pub async fn flush(&self) {
        let handles = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *pending)
        };
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Changelog task did not complete");
            }
        }
    }
}
