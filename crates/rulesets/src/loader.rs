//! Dynamic ruleset library loading
//!
//! Scans a designated directory for libraries matching the ruleset naming
//! convention and loads each through a C-ABI entry symbol. Loading is
//! best-effort: a library that fails to load, lacks the entry symbol, or
//! duplicates an already-loaded implementation is skipped with a warning
//! and never aborts the scan.
//!
//! Loaded libraries are kept resident for the process lifetime — factories
//! handed out by a library must never outlive its code.

use crate::error::RulesetError;
use crate::registry::RulesetFactory;
use libloading::Library;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File-stem prefix a ruleset library must carry (a `lib` prefix added by
/// the platform is ignored). Names containing `test` are excluded.
pub const RULESET_LIBRARY_PREFIX: &str = "tempo_ruleset_";

/// Entry symbol every ruleset library must export.
pub const RULESET_ENTRY_SYMBOL: &str = "tempo_ruleset_entry";

/// Signature of the entry symbol: returns a heap-allocated registration
/// the host takes ownership of.
pub type RulesetEntry = unsafe extern "C" fn() -> *mut RulesetRegistration;

/// Registration handed over by a ruleset library's entry symbol
pub struct RulesetRegistration {
    /// Instantiation reference to register the factory under
    pub reference: String,
    /// Factory producing instances of the implementation
    pub factory: RulesetFactory,
}

/// One successfully loaded ruleset library
pub(crate) struct LoadedLibrary {
    /// Keeps the library mapped while any factory from it is alive.
    _library: Arc<Library>,
    pub(crate) reference: String,
    pub(crate) factory: RulesetFactory,
}

impl LoadedLibrary {
    /// Load a library and take its registration.
    ///
    /// # Safety
    ///
    /// Loading a library runs its initializers, and the entry symbol is
    /// trusted to match [`RulesetEntry`] and return a valid
    /// `Box<RulesetRegistration>` pointer. Only call on paths matching the
    /// ruleset naming convention from a directory the user designated.
    unsafe fn load(path: &Path) -> Result<Self, RulesetError> {
        let library = Library::new(path).map_err(|e| RulesetError::LibraryLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let entry = library
            .get::<RulesetEntry>(RULESET_ENTRY_SYMBOL.as_bytes())
            .map_err(|e| RulesetError::LibraryLoad {
                path: path.to_path_buf(),
                message: format!("missing entry symbol: {e}"),
            })?;

        let registration = Box::from_raw(entry());
        Ok(Self {
            _library: Arc::new(library),
            reference: registration.reference,
            factory: registration.factory,
        })
    }
}

/// Whether a path looks like a ruleset library by the naming convention.
fn is_ruleset_library(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    let stem = stem.strip_prefix("lib").unwrap_or(stem);
    stem.starts_with(RULESET_LIBRARY_PREFIX)
        && !stem.to_ascii_lowercase().contains("test")
        && path.extension().and_then(|e| e.to_str()) == Some(std::env::consts::DLL_EXTENSION)
}

/// Scan `dir` for ruleset libraries and load each at most once.
///
/// Duplicates are detected by the instantiation reference the library
/// registers, so two copies of the same implementation load once. An
/// unreadable directory yields an empty result with a warning; per-file
/// failures are likewise logged and skipped.
pub(crate) fn scan_directory(dir: &Path) -> Vec<LoadedLibrary> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "could not scan ruleset directory");
            return Vec::new();
        }
    };

    let mut loaded: Vec<LoadedLibrary> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !is_ruleset_library(&path) {
            continue;
        }

        match unsafe { LoadedLibrary::load(&path) } {
            Ok(library) => {
                if loaded.iter().any(|l| l.reference == library.reference) {
                    debug!(
                        path = %path.display(),
                        reference = %library.reference,
                        "skipping duplicate ruleset implementation"
                    );
                    continue;
                }
                info!(
                    path = %path.display(),
                    reference = %library.reference,
                    "loaded ruleset library"
                );
                loaded.push(library);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to load ruleset library"),
        }
    }
    loaded
}
