//! Core library for Alithia - collection cache, document store client, auth.
//!
//! This crate contains the shared logic used by the command-line front end:
//! - Local collection cache with optimistic write-through (`cache`)
//! - The remote document store contract and implementations (`store`, `api`)
//! - Data models for records and collection presets (`models`)
//! - Session persistence and keeper permissions (`auth`)
//! - Configuration management (`config`)
//! - Formatting utilities (`utils`)

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod store;
pub mod utils;

pub use api::{FirestoreClient, StoreError};
pub use auth::{Role, Session, SessionData, Viewer};
pub use cache::{CacheError, CollectionCache, Filter, FilterSet, ViewState};
pub use config::Config;
pub use models::{CollectionSpec, Fields, Record, RecordId};
pub use store::{MemoryStore, RemoteStore};
