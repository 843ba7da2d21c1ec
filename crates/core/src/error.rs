//! Error types for the tempo store
//!
//! This module defines the error type used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::entity::EntityKind;
use crate::id::EntityId;
use std::io;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error types for the tempo store
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error (snapshot file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Snapshot file corruption detected at open
    #[error("data corruption: {0}")]
    Corruption(String),

    /// A usage or live-reference resolution outlived a schema migration
    #[error("stale context: generation {held} was invalidated (current generation {current})")]
    Stale {
        /// Generation captured when the usage was acquired
        held: u64,
        /// Current generation of the owning factory
        current: u64,
    },

    /// Attempted to wrap a record that has never been committed
    #[error("{kind} record {id} has not been persisted")]
    NotPersisted {
        /// Kind of the record
        kind: EntityKind,
        /// Primary key of the record
        id: EntityId,
    },

    /// Invalid operation or state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
