//! Case-insensitive substring search with match spans for highlighting.

use std::ops::Range;

use crate::models::Record;

/// Where a query matched inside one field, as byte ranges into the
/// field's original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    pub field: String,
    pub spans: Vec<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub record: &'a Record,
    /// Empty when the query was too short to filter.
    pub matches: Vec<FieldMatch>,
}

impl SearchHit<'_> {
    /// Spans matched in `field`, if any.
    pub fn spans(&self, field: &str) -> &[Range<usize>] {
        self.matches
            .iter()
            .find(|m| m.field == field)
            .map(|m| m.spans.as_slice())
            .unwrap_or(&[])
    }
}

/// A trimmed, lowercased query, or `None` when it is shorter than
/// `min_chars` (at least one) and so does not filter.
pub fn normalize_query(query: &str, min_chars: usize) -> Option<Vec<char>> {
    let trimmed = query.trim();
    if trimmed.chars().count() < min_chars.max(1) {
        return None;
    }
    Some(trimmed.chars().flat_map(char::to_lowercase).collect())
}

/// Non-overlapping spans of `needle` (already lowercased) in `haystack`,
/// compared case-insensitively.
pub fn find_spans(haystack: &str, needle: &[char]) -> Vec<Range<usize>> {
    if needle.is_empty() {
        return Vec::new();
    }

    // Lowercased characters, each tagged with the byte range of the
    // original character it came from.
    let folded: Vec<(char, usize, usize)> = haystack
        .char_indices()
        .flat_map(|(start, c)| {
            let end = start + c.len_utf8();
            c.to_lowercase().map(move |lower| (lower, start, end))
        })
        .collect();

    let mut spans = Vec::new();
    let mut i = 0;
    while i + needle.len() <= folded.len() {
        let window = &folded[i..i + needle.len()];
        if window.iter().zip(needle).all(|((c, _, _), n)| c == n) {
            spans.push(window[0].1..window[needle.len() - 1].2);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    spans
}

/// Match one record against a normalized query.
pub fn match_record(record: &Record, fields: &[String], needle: &[char]) -> Vec<FieldMatch> {
    fields
        .iter()
        .filter_map(|field| {
            let text = record.text(field)?;
            let spans = find_spans(text, needle);
            if spans.is_empty() {
                None
            } else {
                Some(FieldMatch {
                    field: field.clone(),
                    spans,
                })
            }
        })
        .collect()
}

/// True when `record` matches `query`; a too-short query matches everything.
pub fn matches(record: &Record, fields: &[String], query: &str, min_chars: usize) -> bool {
    match normalize_query(query, min_chars) {
        Some(needle) => fields
            .iter()
            .filter_map(|field| record.text(field))
            .any(|text| !find_spans(text, &needle).is_empty()),
        None => true,
    }
}

/// Search `items` in order. A too-short query returns every record with no
/// spans.
pub fn search<'a, I>(items: I, fields: &[String], query: &str, min_chars: usize) -> Vec<SearchHit<'a>>
where
    I: IntoIterator<Item = &'a Record>,
{
    let Some(needle) = normalize_query(query, min_chars) else {
        return items
            .into_iter()
            .map(|record| SearchHit {
                record,
                matches: Vec::new(),
            })
            .collect();
    };

    items
        .into_iter()
        .filter_map(|record| {
            let matches = match_record(record, fields, &needle);
            if matches.is_empty() {
                None
            } else {
                Some(SearchHit { record, matches })
            }
        })
        .collect()
}

/// Wrap each span of `text` in `open`/`close` markers.
pub fn highlight(text: &str, spans: &[Range<usize>], open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * (open.len() + close.len()));
    let mut cursor = 0;
    for span in spans {
        if span.start < cursor || span.end > text.len() {
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        out.push_str(open);
        out.push_str(&text[span.clone()]);
        out.push_str(close);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}
