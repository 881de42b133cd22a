//! Data models for Alithia collections.
//!
//! - `Record`, `RecordId`, `Fields`: one mirrored remote document
//! - `CollectionSpec`, `Facet`, `WritePolicy`: per-collection configuration,
//!   with presets for characters, factions, lore, updates and changelog

pub mod collection;
pub mod record;

pub use collection::{CollectionSpec, Facet, WritePolicy, PRESET_NAMES};
pub use record::{Fields, Record, RecordId, AUTHOR_NAME_FIELD, AUTHOR_UID_FIELD};
