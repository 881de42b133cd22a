//! Authentication module for managing the signed-in user.
//!
//! This module provides:
//! - `Session`: id/refresh token persistence with expiry tracking
//! - `Viewer`, `Role`: the signed-in user and their keeper status, passed
//!   explicitly to whatever renders or writes records
//!
//! Sessions are persisted to disk; id tokens expire after about an hour and
//! are refreshed with the stored refresh token.

pub mod session;
pub mod viewer;

pub use session::{Session, SessionData};
pub use viewer::{resolve_role, Role, Viewer};
