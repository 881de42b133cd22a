use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Document;

/// Field holding the uid of the user who created a record.
pub const AUTHOR_UID_FIELD: &str = "authorUid";

/// Field holding the display name (or email) of the user who created a record.
pub const AUTHOR_NAME_FIELD: &str = "authorName";

/// Free-form "written by" credit some pages keep alongside the author.
const WRITTEN_BY_FIELD: &str = "writtenBy";

/// Named attributes of a record, kept in insertion order.
pub type Fields = serde_json::Map<String, Value>;

/// Opaque document identifier assigned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One remote document mirrored in a collection cache.
///
/// `created_at` and `updated_at` are only known once a bulk load has seen
/// the server-resolved values; a record created locally during the session
/// has neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(id: RecordId, fields: Fields) -> Self {
        Self {
            id,
            fields,
            created_at: None,
            updated_at: None,
        }
    }

    /// Build a record from a store document, lifting the timestamp fields
    /// out of `fields` when they hold RFC 3339 strings.
    pub fn from_document(doc: Document, created_field: &str, updated_field: Option<&str>) -> Self {
        let mut fields = doc.fields;
        let created_at = take_timestamp(&mut fields, created_field);
        let updated_at = updated_field.and_then(|name| take_timestamp(&mut fields, name));
        Self {
            id: doc.id,
            fields,
            created_at,
            updated_at,
        }
    }

    /// String value of a field, if present and a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// String value of a field, or `default` when missing or empty.
    pub fn text_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str {
        match self.text(field) {
            Some(value) if !value.is_empty() => value,
            _ => default,
        }
    }

    pub fn author_uid(&self) -> Option<&str> {
        self.text(AUTHOR_UID_FIELD)
    }

    /// Credit shown on cards: the "written by" field, else the author name.
    pub fn byline(&self) -> Option<&str> {
        [WRITTEN_BY_FIELD, AUTHOR_NAME_FIELD]
            .iter()
            .filter_map(|field| self.text(field))
            .find(|value| !value.is_empty())
    }

    /// Overwrite the given fields in place, keeping existing field order.
    pub fn merge(&mut self, patch: &Fields) {
        for (key, value) in patch {
            self.fields.insert(key.clone(), value.clone());
        }
    }
}

fn take_timestamp(fields: &mut Fields, name: &str) -> Option<DateTime<Utc>> {
    let parsed = fields
        .get(name)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))?;
    fields.remove(name);
    Some(parsed)
}
