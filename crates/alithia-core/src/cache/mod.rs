//! Local collection cache.
//!
//! A `CollectionCache` mirrors one remote collection in memory and is the
//! single source of truth for what gets displayed:
//! - Bulk load on demand, newest first, with reconciliation via `load`
//! - Optimistic write-through: local state changes only after the store
//!   acknowledges a write
//! - Pure views, search and facet counts computed from the cached items
//! - Change notifications over a `tokio::sync::watch` channel
//!
//! Audit entries for writes go through `ChangeLog` and never block the write
//! they describe.

pub mod changelog;
pub mod collection;
pub mod error;
pub mod facets;
pub mod filter;
pub mod search;

pub use changelog::{ChangeLog, CHANGELOG_COLLECTION};
pub use collection::{CacheSnapshot, Change, CollectionCache, ViewState};
pub use error::{CacheError, WriteOp};
pub use facets::FacetCounts;
pub use filter::{Filter, FilterSet};
pub use search::{highlight, FieldMatch, SearchHit};
