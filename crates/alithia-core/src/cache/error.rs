use std::fmt;

use thiserror::Error;

use crate::api::StoreError;
use crate::models::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::Create => write!(f, "create"),
            WriteOp::Update => write!(f, "update"),
            WriteOp::Delete => write!(f, "delete"),
        }
    }
}

/// Failure of a cache operation. The cache is always left in its
/// last-known-good state.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to load {collection}: {source}")]
    Load {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to {op} in {collection}: {source}")]
    Write {
        op: WriteOp,
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("No record {id} in {collection}")]
    NotCached { collection: String, id: RecordId },

    #[error("Field '{field}' is required")]
    MissingField { field: String },

    #[error("Field '{field}' is longer than {max} characters")]
    FieldTooLong { field: String, max: usize },
}

impl CacheError {
    /// Short message suitable for an inline error next to the control that
    /// triggered the operation.
    pub fn user_message(&self) -> String {
        match self {
            CacheError::Load { source, .. } if source.is_permission() => {
                "Could not load - you do not have access.".to_string()
            }
            CacheError::Load { .. } => "Could not load. Check your connection and try again.".to_string(),
            CacheError::Write { source, .. } if source.is_permission() => {
                "You do not have permission to do that.".to_string()
            }
            CacheError::Write { op: WriteOp::Delete, .. } => {
                "Failed to delete. Check your connection and try again.".to_string()
            }
            CacheError::Write { .. } => "Failed to save. Check your connection and try again.".to_string(),
            CacheError::NotCached { .. } => "That entry no longer exists. Reload and try again.".to_string(),
            CacheError::MissingField { field } => format!("Please enter a {}.", field),
            CacheError::FieldTooLong { field, max } => format!("The {} must be at most {} characters.", field, max),
        }
    }

    /// The underlying store failure, if this error came from the store.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            CacheError::Load { source, .. } | CacheError::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}
