//! Cache-owned filter state.
//!
//! Filters are predicates over records, evaluated against the current items
//! every time a view is asked for. A `FilterSet` holds at most one filter per
//! key and composes them with AND.

use super::search;
use crate::models::{CollectionSpec, Record};

const AUTHOR_KEY: &str = "@author";
const TEXT_KEY: &str = "@text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Record falls in the facet bucket `value` (same rules as counts).
    Bucket { field: String, value: String },
    /// Trimmed field text equals `value`.
    Equals { field: String, value: String },
    /// Record was created by this uid.
    Author(String),
    /// Free-text search over the collection's search fields.
    Text(String),
}

impl Filter {
    /// Pick the filter kind for `field`: bucketed facets use bucket rules,
    /// everything else compares text.
    pub fn for_field(spec: &CollectionSpec, field: &str, value: &str) -> Self {
        match spec.facet_for(field) {
            Some(_) => Filter::Bucket {
                field: field.to_string(),
                value: value.trim().to_string(),
            },
            None => Filter::Equals {
                field: field.to_string(),
                value: value.trim().to_string(),
            },
        }
    }

    /// Filters with the same key replace each other in a `FilterSet`.
    pub fn key(&self) -> &str {
        match self {
            Filter::Bucket { field, .. } | Filter::Equals { field, .. } => field,
            Filter::Author(_) => AUTHOR_KEY,
            Filter::Text(_) => TEXT_KEY,
        }
    }

    pub fn matches(&self, record: &Record, spec: &CollectionSpec) -> bool {
        match self {
            Filter::Bucket { field, value } => match spec.facet_for(field) {
                Some(facet) => facet.bucket_of(record) == Some(value.as_str()),
                None => record.text(field).map(str::trim) == Some(value.as_str()),
            },
            Filter::Equals { field, value } => record.text(field).map(str::trim) == Some(value.trim()),
            Filter::Author(uid) => record.author_uid() == Some(uid.as_str()),
            Filter::Text(query) => search::matches(record, &spec.search_fields, query, spec.min_query_chars),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, replacing any active filter with the same key.
    pub fn set(&mut self, filter: Filter) {
        match self.filters.iter_mut().find(|f| f.key() == filter.key()) {
            Some(existing) => *existing = filter,
            None => self.filters.push(filter),
        }
    }

    pub fn with(mut self, filter: Filter) -> Self {
        self.set(filter);
        self
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    /// Every filter matches.
    pub fn matches(&self, record: &Record, spec: &CollectionSpec) -> bool {
        self.filters.iter().all(|f| f.matches(record, spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::new("r".into(), value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_bucket_filter_uses_fallback() {
        let spec = CollectionSpec::characters();
        let unknown = Filter::for_field(&spec, "status", "unknown");
        assert!(unknown.matches(&record(json!({ "status": "undead" })), &spec));
        assert!(unknown.matches(&record(json!({})), &spec));
        assert!(!unknown.matches(&record(json!({ "status": "alive" })), &spec));
    }

    #[test]
    fn test_equals_filter_trims() {
        let spec = CollectionSpec::updates();
        let filter = Filter::for_field(&spec, "mood", " grim ");
        assert!(matches!(filter, Filter::Equals { .. }));
        assert!(filter.matches(&record(json!({ "mood": "grim  " })), &spec));
    }

    #[test]
    fn test_set_replaces_same_key() {
        let spec = CollectionSpec::characters();
        let mut set = FilterSet::new();
        set.set(Filter::for_field(&spec, "status", "alive"));
        set.set(Filter::for_field(&spec, "status", "missing"));
        set.set(Filter::Text("thor".to_string()));
        set.set(Filter::Text("vess".to_string()));

        let filters: Vec<&Filter> = set.iter().collect();
        assert_eq!(filters.len(), 2);
        assert_eq!(
            filters[0],
            &Filter::Bucket {
                field: "status".to_string(),
                value: "missing".to_string()
            }
        );
        assert_eq!(filters[1], &Filter::Text("vess".to_string()));
    }

    #[test]
    fn test_filters_compose_with_and() {
        let spec = CollectionSpec::characters();
        let set = FilterSet::new()
            .with(Filter::for_field(&spec, "status", "alive"))
            .with(Filter::Author("u1".to_string()));

        assert!(set.matches(&record(json!({ "status": "alive", "authorUid": "u1" })), &spec));
        assert!(!set.matches(&record(json!({ "status": "alive", "authorUid": "u2" })), &spec));
        assert!(!set.matches(&record(json!({ "status": "missing", "authorUid": "u1" })), &spec));
    }
}
