//! Error types for ruleset discovery and instantiation

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while registering, loading or instantiating rulesets.
///
/// These never abort a discovery or consistency pass: per-implementation
/// failures are logged and the implementation is marked unavailable.
#[derive(Debug, Error)]
pub enum RulesetError {
    /// No factory is registered under the requested reference
    #[error("no ruleset registered for reference `{0}`")]
    UnknownReference(String),

    /// A factory is already registered under this reference
    #[error("duplicate ruleset registration for reference `{0}`")]
    DuplicateReference(String),

    /// A dynamic library failed to load or lacked the entry symbol
    #[error("failed to load ruleset library {path:?}: {message}")]
    LibraryLoad {
        /// Library path on disk
        path: PathBuf,
        /// Loader error description
        message: String,
    },
}
