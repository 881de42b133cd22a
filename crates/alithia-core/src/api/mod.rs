//! REST client module for the hosted document store.
//!
//! This module provides `FirestoreClient`, the production implementation of
//! `RemoteStore`, together with the typed wire value codec and the
//! `StoreError` taxonomy shared by every store implementation.
//!
//! Requests are authenticated with the id token obtained from the identity
//! service's password sign-in endpoint.

pub mod client;
pub mod error;
pub mod value;

pub use client::FirestoreClient;
pub use error::StoreError;
