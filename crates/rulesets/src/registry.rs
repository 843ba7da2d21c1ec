//! Factory registry keyed by instantiation reference
//!
//! Instantiation references take the form `<short_name>@<version>`
//! (`taiko@1.4.2`). The registry resolves a reference two ways:
//!
//! - exact: the stored reference matches a registered key
//! - version-insensitive: the `@version` suffix is ignored, so a catalog
//!   row persisted by a release build still resolves against a local
//!   development build carrying a different version
//!
//! Compiled-in rulesets are registered explicitly at startup; the
//! directory loader registers anything it finds on disk. There is no
//! ambient global registry: each store receives its registry by explicit
//! parameter.

use crate::error::RulesetError;
use crate::ruleset::Ruleset;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Factory function producing one ruleset instance per call
pub type RulesetFactory = Arc<dyn Fn() -> Box<dyn Ruleset> + Send + Sync>;

/// Reference with any `@version` suffix stripped.
pub(crate) fn base_ref(reference: &str) -> &str {
    reference.split('@').next().unwrap_or(reference)
}

/// Registry of ruleset factories keyed by instantiation reference
#[derive(Clone, Default)]
pub struct RulesetRegistry {
    factories: FxHashMap<String, RulesetFactory>,
}

impl RulesetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under an instantiation reference.
    ///
    /// # Errors
    ///
    /// [`RulesetError::DuplicateReference`] if the reference is taken.
    pub fn register<R, F>(
        &mut self,
        reference: impl Into<String>,
        factory: F,
    ) -> Result<(), RulesetError>
    where
        R: Ruleset + 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.register_factory(reference, Arc::new(move || Box::new(factory()) as Box<dyn Ruleset>))
    }

    /// Register a pre-built factory under an instantiation reference.
    pub fn register_factory(
        &mut self,
        reference: impl Into<String>,
        factory: RulesetFactory,
    ) -> Result<(), RulesetError> {
        let reference = reference.into();
        if self.factories.contains_key(&reference) {
            return Err(RulesetError::DuplicateReference(reference));
        }
        self.factories.insert(reference, factory);
        Ok(())
    }

    /// Whether any registered reference shares this reference's base.
    pub fn contains_base(&self, reference: &str) -> bool {
        let base = base_ref(reference);
        self.factories.keys().any(|k| base_ref(k) == base)
    }

    /// All registered references.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiate by exact reference.
    pub fn instantiate(&self, reference: &str) -> Result<Box<dyn Ruleset>, RulesetError> {
        match self.factories.get(reference) {
            Some(factory) => Ok(factory()),
            None => Err(RulesetError::UnknownReference(reference.to_string())),
        }
    }

    /// Instantiate ignoring the `@version` suffix.
    ///
    /// Returns the reference the implementation is currently registered
    /// under together with the instance, so a caller can refresh a stored
    /// reference to the current one. An exact match wins over a
    /// base-name match.
    pub fn instantiate_any_version(
        &self,
        reference: &str,
    ) -> Result<(String, Box<dyn Ruleset>), RulesetError> {
        if let Some(factory) = self.factories.get(reference) {
            return Ok((reference.to_string(), factory()));
        }

        let base = base_ref(reference);
        self.factories
            .iter()
            .find(|(k, _)| base_ref(k) == base)
            .map(|(k, factory)| (k.clone(), factory()))
            .ok_or_else(|| RulesetError::UnknownReference(reference.to_string()))
    }
}

impl std::fmt::Debug for RulesetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulesetRegistry")
            .field("references", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
