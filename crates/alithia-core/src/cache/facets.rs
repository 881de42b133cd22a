//! Aggregates derived from the cached items.
//!
//! Nothing here is stored: counts and value lists are recomputed from the
//! items on every call so they cannot drift from what the views show.

use crate::models::{Facet, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetCounts {
    pub field: String,
    /// Number of records in the collection (the "all" count).
    pub total: usize,
    /// Buckets in configured order, or first-seen order for dynamic facets.
    pub buckets: Vec<(String, usize)>,
}

impl FacetCounts {
    pub fn get(&self, bucket: &str) -> usize {
        self.buckets
            .iter()
            .find(|(name, _)| name == bucket)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

pub fn count(items: &[Record], facet: &Facet) -> FacetCounts {
    let mut buckets: Vec<(String, usize)> = facet.buckets.iter().map(|b| (b.clone(), 0)).collect();

    for record in items {
        let Some(bucket) = facet.bucket_of(record) else {
            continue;
        };
        match buckets.iter_mut().find(|(name, _)| name == bucket) {
            Some((_, count)) => *count += 1,
            None => buckets.push((bucket.to_string(), 1)),
        }
    }

    FacetCounts {
        field: facet.field.clone(),
        total: items.len(),
        buckets,
    }
}

/// Distinct trimmed, non-empty values of `field`, in first-seen order.
pub fn unique_values(items: &[Record], field: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for value in items
        .iter()
        .filter_map(|r| r.text(field))
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }
    values
}

pub fn count_by_author(items: &[Record], uid: &str) -> usize {
    items.iter().filter(|r| r.author_uid() == Some(uid)).count()
}
