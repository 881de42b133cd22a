//! Per-collection configuration.
//!
//! A `CollectionSpec` tells the generic cache everything that used to be
//! hard-coded per page: the remote collection name, which field orders the
//! bulk read, which fields search looks at, how records are bucketed for
//! counts and filters, what must be present before a write, and who may
//! write.

use serde_json::Value;

use super::record::{Fields, Record};

/// Default field carrying the server-assigned creation time.
pub const DEFAULT_ORDER_FIELD: &str = "createdAt";

/// Default field carrying the server-assigned last-edit time.
pub const DEFAULT_UPDATED_FIELD: &str = "updatedAt";

/// Shortest trimmed query that filters, unless a collection sets its own.
pub const DEFAULT_MIN_QUERY_CHARS: usize = 2;

/// Names accepted by [`CollectionSpec::preset`].
pub const PRESET_NAMES: &[&str] = &["characters", "factions", "lore", "updates", "changelog"];

/// Who may create, edit and delete records in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Only keepers write.
    KeeperOnly,
    /// Anyone signed in creates; only the author edits or deletes.
    AuthorsOwn,
    /// Anyone signed in creates; the author or a keeper edits or deletes.
    AuthorsOrKeeper,
}

/// Bucketing of one field for counts and filters.
///
/// With `buckets` set, values outside the list land in `fallback` (or are
/// not counted when there is none). With no buckets the facet is dynamic:
/// every trimmed non-empty value is its own bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    pub field: String,
    pub buckets: Vec<String>,
    pub fallback: Option<String>,
}

impl Facet {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            buckets: Vec::new(),
            fallback: None,
        }
    }

    pub fn buckets(mut self, buckets: &[&str]) -> Self {
        self.buckets = buckets.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn fallback(mut self, fallback: &str) -> Self {
        self.fallback = Some(fallback.to_string());
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.buckets.is_empty()
    }

    /// The bucket a record falls into, if any.
    pub fn bucket_of<'a>(&'a self, record: &'a Record) -> Option<&'a str> {
        let raw = record
            .text(&self.field)
            .map(str::trim)
            .filter(|value| !value.is_empty());

        if self.is_dynamic() {
            return raw.or(self.fallback.as_deref());
        }

        match raw {
            Some(value) if self.buckets.iter().any(|b| b == value) => Some(value),
            _ => self.fallback.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub order_field: String,
    pub updated_field: Option<String>,
    pub title_field: String,
    pub preview_field: Option<String>,
    pub search_fields: Vec<String>,
    pub facets: Vec<Facet>,
    pub required: Vec<String>,
    pub max_lengths: Vec<(String, usize)>,
    /// Written on create when the caller did not set them.
    pub create_defaults: Fields,
    /// Written on every update, overriding the caller.
    pub update_marks: Fields,
    pub min_query_chars: usize,
    /// Noun used for changelog entries ("character" -> `character_added`).
    pub audit: Option<String>,
    pub policy: WritePolicy,
}

impl CollectionSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            order_field: DEFAULT_ORDER_FIELD.to_string(),
            updated_field: Some(DEFAULT_UPDATED_FIELD.to_string()),
            title_field: "title".to_string(),
            preview_field: None,
            search_fields: Vec::new(),
            facets: Vec::new(),
            required: Vec::new(),
            max_lengths: Vec::new(),
            create_defaults: Fields::new(),
            update_marks: Fields::new(),
            min_query_chars: DEFAULT_MIN_QUERY_CHARS,
            audit: None,
            policy: WritePolicy::AuthorsOrKeeper,
        }
    }

    pub fn order_field(mut self, field: &str) -> Self {
        self.order_field = field.to_string();
        self
    }

    pub fn updated_field(mut self, field: Option<&str>) -> Self {
        self.updated_field = field.map(str::to_string);
        self
    }

    pub fn title_field(mut self, field: &str) -> Self {
        self.title_field = field.to_string();
        self
    }

    pub fn preview_field(mut self, field: &str) -> Self {
        self.preview_field = Some(field.to_string());
        self
    }

    pub fn search_fields(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn facet(mut self, facet: Facet) -> Self {
        self.facets.push(facet);
        self
    }

    pub fn required(mut self, fields: &[&str]) -> Self {
        self.required = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn max_length(mut self, field: &str, max: usize) -> Self {
        self.max_lengths.push((field.to_string(), max));
        self
    }

    pub fn create_default(mut self, field: &str, value: Value) -> Self {
        self.create_defaults.insert(field.to_string(), value);
        self
    }

    pub fn update_mark(mut self, field: &str, value: Value) -> Self {
        self.update_marks.insert(field.to_string(), value);
        self
    }

    pub fn min_query_chars(mut self, chars: usize) -> Self {
        self.min_query_chars = chars;
        self
    }

    /// Caller fields plus the create defaults they did not set.
    pub fn fields_for_create(&self, mut fields: Fields) -> Fields {
        for (key, value) in &self.create_defaults {
            if !fields.contains_key(key) {
                fields.insert(key.clone(), value.clone());
            }
        }
        fields
    }

    /// Caller fields with the update marks applied on top.
    pub fn fields_for_update(&self, mut fields: Fields) -> Fields {
        fields.extend(self.update_marks.clone());
        fields
    }

    pub fn audit(mut self, noun: &str) -> Self {
        self.audit = Some(noun.to_string());
        self
    }

    pub fn policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Facet configured for `field`, if any.
    pub fn facet_for(&self, field: &str) -> Option<&Facet> {
        self.facets.iter().find(|f| f.field == field)
    }

    /// Look up one of the built-in collections by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "characters" => Some(Self::characters()),
            "factions" => Some(Self::factions()),
            "lore" => Some(Self::lore()),
            "updates" => Some(Self::updates()),
            "changelog" => Some(Self::changelog()),
            _ => None,
        }
    }

    pub fn characters() -> Self {
        Self::new("characters")
            .preview_field("synopsis")
            .search_fields(&[
                "title",
                "synopsis",
                "charClass",
                "race",
                "region",
                "affiliation",
                "writtenBy",
                "authorName",
            ])
            .facet(
                Facet::new("status")
                    .buckets(&["alive", "deceased", "missing", "unknown"])
                    .fallback("unknown"),
            )
            .facet(Facet::new("affiliation"))
            .required(&["title"])
            .audit("character")
            .policy(WritePolicy::KeeperOnly)
    }

    pub fn factions() -> Self {
        Self::new("factions")
            .preview_field("synopsis")
            .search_fields(&[
                "title",
                "synopsis",
                "type",
                "region",
                "members",
                "alignment",
                "authorName",
            ])
            .facet(
                Facet::new("type")
                    .buckets(&[
                        "military",
                        "political",
                        "religious",
                        "criminal",
                        "mercantile",
                        "arcane",
                        "other",
                    ])
                    .fallback("other"),
            )
            .facet(Facet::new("status").fallback("active"))
            .required(&["title"])
            .audit("faction")
            .policy(WritePolicy::KeeperOnly)
    }

    pub fn lore() -> Self {
        Self::new("lore")
            .preview_field("synopsis")
            .search_fields(&["title", "synopsis", "category", "authorName"])
            .facet(Facet::new("category").buckets(&[
                "region",
                "faction",
                "character",
                "history",
                "magic",
                "misc",
            ]))
            .required(&["title"])
            .policy(WritePolicy::KeeperOnly)
    }

    /// Dashboard feed posts.
    pub fn updates() -> Self {
        Self::new("updates")
            .updated_field(None)
            .title_field("content")
            .search_fields(&["content", "authorName"])
            .required(&["content"])
            .max_length("content", 1000)
            .create_default("edited", Value::Bool(false))
            .update_mark("edited", Value::Bool(true))
            .policy(WritePolicy::AuthorsOwn)
    }

    pub fn changelog() -> Self {
        Self::new("changelog")
            .updated_field(None)
            .title_field("summary")
            .preview_field("preview")
            .search_fields(&["type", "summary", "preview"])
            .facet(Facet::new("type"))
            .required(&["summary"])
            .min_query_chars(1)
            .policy(WritePolicy::AuthorsOrKeeper)
    }
}
