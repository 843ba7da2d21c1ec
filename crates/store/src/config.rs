//! Store configuration
//!
//! Fluent builder for opening a [`ContextFactory`]. Two ways to open:
//!
//! ```ignore
//! // 1. Disk-backed (the normal client configuration)
//! let factory = ContextFactory::open(StoreConfig::at("/data/client"))?;
//!
//! // 2. Ephemeral (no files; unit tests and throwaway state)
//! let factory = ContextFactory::open(StoreConfig::ephemeral())?;
//! ```
//!
//! [`ContextFactory`]: crate::ContextFactory

use chrono::Duration;
use std::path::PathBuf;

/// Current schema version written by this build.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Default soft-delete retention before cleanup purges a record.
const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Configuration for a [`ContextFactory`]
///
/// [`ContextFactory`]: crate::ContextFactory
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub(crate) dir: Option<PathBuf>,
    pub(crate) schema_version: u32,
    pub(crate) retention: Duration,
}

impl StoreConfig {
    /// Configuration for an ephemeral store: no files, state lost on drop.
    ///
    /// Use for unit tests and truly throwaway state.
    pub fn ephemeral() -> Self {
        Self {
            dir: None,
            schema_version: CURRENT_SCHEMA_VERSION,
            retention: Duration::days(DEFAULT_RETENTION_DAYS),
        }
    }

    /// Configuration for a disk-backed store rooted at `dir`.
    pub fn at<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::ephemeral()
        }
    }

    /// Override the schema version this build expects.
    ///
    /// Opening a file persisted at an older version migrates it forward and
    /// invalidates any outstanding contexts.
    pub fn schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    /// Override the soft-delete retention window used by store cleanup.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}
