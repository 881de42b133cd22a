//! Plain-text rendering of records, search hits and facet counts.

use std::ops::Range;

use alithia_core::cache::{highlight, FacetCounts, SearchHit};
use alithia_core::utils::{relative_time, truncate_string};
use alithia_core::{CollectionSpec, Record};
use chrono::{DateTime, Utc};

const TITLE_WIDTH: usize = 60;
const PREVIEW_WIDTH: usize = 100;

/// Characters kept on each side of the first match in a snippet.
const SNIPPET_CONTEXT: usize = 40;

const MARK_OPEN: &str = "[";
const MARK_CLOSE: &str = "]";

/// `<id>  <title>  [bucket]  (<byline>, <age>)`
pub fn record_line(record: &Record, spec: &CollectionSpec, now: DateTime<Utc>) -> String {
    let title = record.text_or(&spec.title_field, "Untitled");
    let mut line = format!("{}  {}", record.id, truncate_string(title, TITLE_WIDTH));

    if let Some(bucket) = spec.facets.first().and_then(|f| f.bucket_of(record)) {
        line.push_str(&format!("  [{}]", bucket));
    }

    let mut meta = Vec::new();
    if let Some(byline) = record.byline() {
        meta.push(byline.to_string());
    }
    if let Some(at) = record.created_at {
        meta.push(relative_time(at, now));
    }
    if !meta.is_empty() {
        line.push_str(&format!("  ({})", meta.join(", ")));
    }
    line
}

pub fn preview_line(record: &Record, spec: &CollectionSpec) -> Option<String> {
    let text = spec
        .preview_field
        .as_deref()
        .and_then(|field| record.text(field))
        .map(str::trim)
        .filter(|text| !text.is_empty())?;
    Some(format!("    {}", truncate_string(text, PREVIEW_WIDTH)))
}

/// Title line with matches marked, then one snippet per other matched field.
pub fn search_hit(hit: &SearchHit<'_>, spec: &CollectionSpec) -> String {
    let title = hit.record.text_or(&spec.title_field, "Untitled");
    let mut out = format!(
        "{}  {}",
        hit.record.id,
        highlight(title, hit.spans(&spec.title_field), MARK_OPEN, MARK_CLOSE)
    );

    for field_match in hit.matches.iter().filter(|m| m.field != spec.title_field) {
        if let Some(text) = hit.record.text(&field_match.field) {
            out.push_str(&format!(
                "\n    {}: {}",
                field_match.field,
                snippet(text, &field_match.spans)
            ));
        }
    }
    out
}

/// A window of `text` around its first span, with every span inside the
/// window marked.
fn snippet(text: &str, spans: &[Range<usize>]) -> String {
    let Some(first) = spans.first() else {
        return truncate_string(text, PREVIEW_WIDTH);
    };

    let start = text[..first.start]
        .char_indices()
        .rev()
        .nth(SNIPPET_CONTEXT - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let end = text[first.end..]
        .char_indices()
        .nth(SNIPPET_CONTEXT)
        .map(|(i, _)| first.end + i)
        .unwrap_or(text.len());

    let shifted: Vec<Range<usize>> = spans
        .iter()
        .filter(|s| s.start >= start && s.end <= end)
        .map(|s| s.start - start..s.end - start)
        .collect();

    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.push_str(&highlight(&text[start..end], &shifted, MARK_OPEN, MARK_CLOSE));
    if end < text.len() {
        out.push_str("...");
    }
    out
}

pub fn facet_table(counts: &FacetCounts) -> String {
    let mut out = format!("{} (all: {})\n", counts.field, counts.total);
    for (bucket, count) in &counts.buckets {
        out.push_str(&format!("  {:<16} {:>5}\n", bucket, count));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alithia_core::cache::search;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::new("abc123".into(), value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_record_line() {
        let spec = CollectionSpec::characters();
        let now = Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap();
        let mut r = record(json!({ "title": "Thorne", "status": "lich", "writtenBy": "Mira" }));
        r.created_at = Some(now - Duration::hours(2));

        assert_eq!(
            record_line(&r, &spec, now),
            "abc123  Thorne  [unknown]  (Mira, 2h ago)"
        );
    }

    #[test]
    fn test_preview_line_skips_blank() {
        let spec = CollectionSpec::characters();
        assert!(preview_line(&record(json!({ "synopsis": "  " })), &spec).is_none());
        assert_eq!(
            preview_line(&record(json!({ "synopsis": "A ranger." })), &spec).unwrap(),
            "    A ranger."
        );
    }

    #[test]
    fn test_search_hit_marks_title_and_fields() {
        let spec = CollectionSpec::characters();
        let items = vec![record(json!({ "title": "Thorne", "synopsis": "Thorne's blade" }))];
        let hits = search::search(&items, &spec.search_fields, "thor", spec.min_query_chars);

        assert_eq!(
            search_hit(&hits[0], &spec),
            "abc123  [Thor]ne\n    synopsis: [Thor]ne's blade"
        );
    }

    #[test]
    fn test_snippet_crops_long_text() {
        let text = format!("{}Thorne{}", "a".repeat(100), "b".repeat(100));
        let out = snippet(&text, &[100..104]);
        assert_eq!(out, format!("...{}[Thor]ne{}...", "a".repeat(40), "b".repeat(38)));
    }

    #[test]
    fn test_facet_table() {
        let counts = FacetCounts {
            field: "status".to_string(),
            total: 3,
            buckets: vec![("alive".to_string(), 2), ("deceased".to_string(), 1)],
        };
        let table = facet_table(&counts);
        assert!(table.starts_with("status (all: 3)\n"));
        assert!(table.contains("  alive                2\n"));
    }
}
