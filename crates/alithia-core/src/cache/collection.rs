use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::changelog::ChangeLog;
use super::error::{CacheError, WriteOp};
use super::facets::{self, FacetCounts};
use super::filter::{Filter, FilterSet};
use super::search::{self, SearchHit};
use crate::api::StoreError;
use crate::models::{CollectionSpec, Fields, Record, RecordId};
use crate::store::{Direction, RemoteStore, WriteRequest};
use crate::utils::age_display;

/// What changed in the cache to produce a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Initial,
    Loaded,
    Created(RecordId),
    Updated(RecordId),
    Deleted(RecordId),
}

/// Published to subscribers after every successful load or mutation.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub revision: u64,
    pub change: Change,
    pub items: Arc<Vec<Record>>,
}

/// What a page should render for the current items and filters.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<'a> {
    /// No load has been attempted yet.
    NotLoaded,
    /// The first load failed; distinct from an empty collection.
    CouldNotLoad(&'a str),
    /// Loaded, and the collection has no records.
    Empty,
    /// Records exist but none pass the active filters.
    NoMatches,
    Ready(Vec<&'a Record>),
}

/// In-memory mirror of one remote collection.
///
/// Loaded once in bulk, then kept in step with the store by applying every
/// successful local write to the cached items (write-through for local
/// authorship). Writes by other clients are only seen on the next `load`.
/// Every view, count and search is computed from the items on demand.
pub struct CollectionCache<S> {
    store: S,
    spec: CollectionSpec,
    items: Vec<Record>,
    loaded_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    filters: FilterSet,
    changelog: Option<Arc<ChangeLog<S>>>,
    revision: u64,
    notifier: watch::Sender<CacheSnapshot>,
}

impl<S> CollectionCache<S>
where
    S: RemoteStore + Clone + 'static,
{
    pub fn new(store: S, spec: CollectionSpec) -> Self {
        let (notifier, _) = watch::channel(CacheSnapshot {
            revision: 0,
            change: Change::Initial,
            items: Arc::new(Vec::new()),
        });
        Self {
            store,
            spec,
            items: Vec::new(),
            loaded_at: None,
            last_error: None,
            filters: FilterSet::new(),
            changelog: None,
            revision: 0,
            notifier,
        }
    }

    /// Write changelog entries for creates and updates, when the
    /// collection has an audit noun configured.
    pub fn with_changelog(mut self, changelog: Arc<ChangeLog<S>>) -> Self {
        self.changelog = Some(changelog);
        self
    }

    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    // ===== Remote operations =====

    /// Replace the items with a fresh bulk read, newest first.
    ///
    /// On failure the items are left untouched and the error is remembered
    /// for `view_state`.
    pub async fn load(&mut self) -> Result<usize, CacheError> {
        let result = self
            .store
            .list_all(&self.spec.name, &self.spec.order_field, Direction::Descending)
            .await;

        let docs = match result {
            Ok(docs) => docs,
            Err(source) => {
                warn!(collection = %self.spec.name, error = %source, "Collection load failed");
                self.last_error = Some(source.to_string());
                return Err(CacheError::Load {
                    collection: self.spec.name.clone(),
                    source,
                });
            }
        };

        let mut seen = HashSet::with_capacity(docs.len());
        let mut items = Vec::with_capacity(docs.len());
        for doc in docs {
            if !seen.insert(doc.id.clone()) {
                warn!(collection = %self.spec.name, id = %doc.id, "Duplicate document in bulk read");
                continue;
            }
            items.push(Record::from_document(
                doc,
                &self.spec.order_field,
                self.spec.updated_field.as_deref(),
            ));
        }

        self.items = items;
        self.loaded_at = Some(Utc::now());
        self.last_error = None;
        debug!(collection = %self.spec.name, count = self.items.len(), "Collection loaded");
        self.notify(Change::Loaded);
        Ok(self.items.len())
    }

    /// Reload when never loaded or when the last load is older than
    /// `max_age`. Returns whether a reload happened.
    pub async fn refresh_if_stale(&mut self, max_age: Duration) -> Result<bool, CacheError> {
        if !self.is_stale(max_age) {
            return Ok(false);
        }
        self.load().await?;
        Ok(true)
    }

    /// Create a record. On success it is placed at the front of the items
    /// with exactly the fields written (`fields` plus the collection's
    /// create defaults); on failure nothing changes locally.
    pub async fn create(&mut self, fields: Fields) -> Result<&Record, CacheError> {
        let fields = self.spec.fields_for_create(fields);
        self.validate(&fields, true)?;

        let mut write =
            WriteRequest::new(fields.clone()).with_server_timestamp(&self.spec.order_field);
        if let Some(ref updated) = self.spec.updated_field {
            write = write.with_server_timestamp(updated);
        }

        let id = match self.store.insert(&self.spec.name, &write).await {
            Ok(id) => id,
            Err(source) => return Err(self.write_error(WriteOp::Create, source)),
        };

        self.items.retain(|r| r.id != id);
        self.items.insert(0, Record::new(id.clone(), fields));
        debug!(collection = %self.spec.name, id = %id, "Record created");

        if let (Some(log), Some(noun)) = (&self.changelog, &self.spec.audit) {
            let record = &self.items[0];
            log.record_added(noun, self.title_of(record), self.preview_of(record));
        }

        self.notify(Change::Created(id));
        Ok(&self.items[0])
    }

    /// Overwrite `fields` on a cached record. Position and creation time
    /// are kept; on failure the cached record keeps its previous values.
    pub async fn update(&mut self, id: &RecordId, fields: Fields) -> Result<&Record, CacheError> {
        if self.position(id).is_none() {
            return Err(self.not_cached(id));
        }
        let fields = self.spec.fields_for_update(fields);
        self.validate(&fields, false)?;

        let mut write = WriteRequest::new(fields.clone());
        if let Some(ref updated) = self.spec.updated_field {
            write = write.with_server_timestamp(updated);
        }

        if let Err(source) = self.store.patch(&self.spec.name, id, &write).await {
            return Err(self.write_error(WriteOp::Update, source));
        }

        let index = self.position(id).ok_or_else(|| self.not_cached(id))?;
        self.items[index].merge(&fields);
        debug!(collection = %self.spec.name, id = %id, "Record updated");

        if let (Some(log), Some(noun)) = (&self.changelog, &self.spec.audit) {
            let record = &self.items[index];
            log.record_edited(noun, self.title_of(record), self.preview_of(record));
        }

        self.notify(Change::Updated(id.clone()));
        Ok(&self.items[index])
    }

    /// Delete a cached record, returning it. On failure it stays cached.
    pub async fn delete(&mut self, id: &RecordId) -> Result<Record, CacheError> {
        if self.position(id).is_none() {
            return Err(self.not_cached(id));
        }

        if let Err(source) = self.store.remove(&self.spec.name, id).await {
            return Err(self.write_error(WriteOp::Delete, source));
        }

        let index = self.position(id).ok_or_else(|| self.not_cached(id))?;
        let removed = self.items.remove(index);
        debug!(collection = %self.spec.name, id = %id, "Record deleted");

        self.notify(Change::Deleted(id.clone()));
        Ok(removed)
    }

    // ===== Read-side views =====

    pub fn items(&self) -> &[Record] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.items.iter().find(|r| &r.id == id)
    }

    /// Records passing `predicate`, in cache order.
    pub fn apply_filter<P>(&self, predicate: P) -> Vec<&Record>
    where
        P: Fn(&Record) -> bool,
    {
        self.items.iter().filter(|r| predicate(r)).collect()
    }

    /// Records passing every filter in `filters`, in cache order.
    pub fn filtered(&self, filters: &FilterSet) -> Vec<&Record> {
        self.apply_filter(|r| filters.matches(r, &self.spec))
    }

    /// Records passing the cache's own active filters.
    pub fn visible(&self) -> Vec<&Record> {
        self.filtered(&self.filters)
    }

    /// Search every cached record; a too-short query returns all of them.
    pub fn search(&self, query: &str) -> Vec<SearchHit<'_>> {
        search::search(&self.items, &self.spec.search_fields, query, self.spec.min_query_chars)
    }

    /// Search only the records passing the active filters.
    pub fn search_visible(&self, query: &str) -> Vec<SearchHit<'_>> {
        search::search(
            self.visible(),
            &self.spec.search_fields,
            query,
            self.spec.min_query_chars,
        )
    }

    /// Bucket counts for a configured facet.
    pub fn counts(&self, field: &str) -> Option<FacetCounts> {
        self.spec
            .facet_for(field)
            .map(|facet| facets::count(&self.items, facet))
    }

    pub fn unique_values(&self, field: &str) -> Vec<String> {
        facets::unique_values(&self.items, field)
    }

    pub fn count_by_author(&self, uid: &str) -> usize {
        facets::count_by_author(&self.items, uid)
    }

    pub fn view_state(&self) -> ViewState<'_> {
        if self.loaded_at.is_none() {
            return match self.last_error {
                Some(ref error) => ViewState::CouldNotLoad(error),
                None => ViewState::NotLoaded,
            };
        }
        if self.items.is_empty() {
            return ViewState::Empty;
        }
        let visible = self.visible();
        if visible.is_empty() {
            ViewState::NoMatches
        } else {
            ViewState::Ready(visible)
        }
    }

    // ===== Filter state =====

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filters.set(filter);
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    // ===== Load state =====

    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Error from the most recent failed load, cleared by a successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.loaded_at {
            Some(at) => Utc::now() - at > max_age,
            None => true,
        }
    }

    /// "just now", "5m ago", ... or "never".
    pub fn age_display(&self) -> String {
        match self.loaded_at {
            Some(at) => age_display((Utc::now() - at).num_minutes()),
            None => "never".to_string(),
        }
    }

    // ===== Notifications =====

    pub fn subscribe(&self) -> watch::Receiver<CacheSnapshot> {
        self.notifier.subscribe()
    }

    fn notify(&mut self, change: Change) {
        self.revision += 1;
        self.notifier.send_replace(CacheSnapshot {
            revision: self.revision,
            change,
            items: Arc::new(self.items.clone()),
        });
    }

    // ===== Helpers =====

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.items.iter().position(|r| &r.id == id)
    }

    fn not_cached(&self, id: &RecordId) -> CacheError {
        CacheError::NotCached {
            collection: self.spec.name.clone(),
            id: id.clone(),
        }
    }

    fn write_error(&self, op: WriteOp, source: StoreError) -> CacheError {
        warn!(collection = %self.spec.name, op = %op, error = %source, "Write failed");
        CacheError::Write {
            op,
            collection: self.spec.name.clone(),
            source,
        }
    }

    fn title_of<'a>(&'a self, record: &'a Record) -> &'a str {
        record.text_or(&self.spec.title_field, "Untitled")
    }

    fn preview_of<'a>(&'a self, record: &'a Record) -> &'a str {
        self.spec
            .preview_field
            .as_deref()
            .and_then(|field| record.text(field))
            .unwrap_or("")
    }

    /// Required fields must be non-empty; on update only the ones being
    /// written are checked.
    fn validate(&self, fields: &Fields, creating: bool) -> Result<(), CacheError> {
        for field in &self.spec.required {
            let blank = match fields.get(field) {
                None => creating,
                Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            };
            if blank {
                return Err(CacheError::MissingField {
                    field: field.clone(),
                });
            }
        }

        for (field, max) in &self.spec.max_lengths {
            if let Some(text) = fields.get(field).and_then(Value::as_str) {
                if text.chars().count() > *max {
                    return Err(CacheError::FieldTooLong {
                        field: field.clone(),
                        max: *max,
                    });
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
