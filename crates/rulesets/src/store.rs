//! Ruleset catalog resolver
//!
//! Reconciles discovered ruleset implementations against the persisted
//! catalog at construction (and on [`RulesetStore::refresh`]):
//!
//! 1. **Discovery** — compiled-in registrations plus a directory scan,
//!    deduplicated by instantiation reference.
//! 2. **Reconciliation** — inside one write usage, every discovered
//!    implementation is instantiated once for its descriptor. Legacy
//!    implementations insert first so their reserved numeric ids are
//!    claimed before any newly discovered implementation could contest
//!    them; non-legacy implementations insert only when their
//!    instantiation reference is not already cataloged.
//! 3. **Consistency pass** — every catalog row (old and new) re-proves its
//!    loadability, version-insensitively so non-release builds still
//!    resolve. Success refreshes the row's descriptor fields and marks it
//!    available; failure marks it unavailable and touches nothing else, so
//!    replays referencing a vanished ruleset keep resolving by id.
//!
//! Lookups search available rows only and hand back live references.

use crate::error::RulesetError;
use crate::loader::{scan_directory, LoadedLibrary};
use crate::registry::{base_ref, RulesetRegistry};
use crate::ruleset::{Ruleset, RulesetDescriptor};
use std::path::Path;
use tempo_core::{RulesetRecord, StoreResult};
use tempo_store::{ChangeKind, ContextFactory, Live};
use tracing::{debug, info, warn};

/// Store and resolver for the ruleset catalog
pub struct RulesetStore {
    factory: ContextFactory,
    registry: RulesetRegistry,
    /// Loaded libraries stay resident for the process lifetime; factories
    /// handed to the registry must never outlive their code.
    _libraries: Vec<LoadedLibrary>,
}

impl RulesetStore {
    /// Build the store and run discovery + reconciliation.
    ///
    /// `registry` carries the compiled-in implementations; `scan_dir`, when
    /// given, is scanned for additional ruleset libraries. Per-library and
    /// per-implementation failures are logged and isolated — a faulty
    /// ruleset never aborts construction.
    pub fn new(
        factory: ContextFactory,
        mut registry: RulesetRegistry,
        scan_dir: Option<&Path>,
    ) -> StoreResult<Self> {
        let mut libraries = Vec::new();
        if let Some(dir) = scan_dir {
            for library in scan_directory(dir) {
                if registry.contains_base(&library.reference) {
                    debug!(
                        reference = %library.reference,
                        "implementation already registered; skipping library"
                    );
                    continue;
                }
                match registry.register_factory(library.reference.clone(), library.factory.clone())
                {
                    Ok(()) => libraries.push(library),
                    Err(e) => warn!(error = %e, "could not register loaded ruleset"),
                }
            }
        }

        let store = Self {
            factory,
            registry,
            _libraries: libraries,
        };
        store.refresh()?;
        Ok(store)
    }

    /// Re-run reconciliation and the consistency pass.
    ///
    /// Idempotent: re-discovering an already-cataloged implementation never
    /// creates a duplicate row.
    pub fn refresh(&self) -> StoreResult<()> {
        // Instantiate every discovered implementation once for its
        // self-described descriptor.
        let mut discovered: Vec<RulesetDescriptor> = Vec::new();
        for reference in self.registry.references() {
            match self.registry.instantiate(reference) {
                Ok(instance) => {
                    discovered.push(RulesetDescriptor::from_instance(instance.as_ref(), reference));
                }
                Err(e) => {
                    warn!(reference, error = %e, "discovered ruleset failed to instantiate");
                }
            }
        }

        self.factory.with_write(|usage| {
            // Legacy implementations claim their reserved numeric ids first.
            for descriptor in discovered.iter().filter(|d| d.legacy_id.is_some()) {
                let taken = !usage
                    .query(|r: &RulesetRecord| r.legacy_id == descriptor.legacy_id)?
                    .is_empty();
                if !taken {
                    usage.put_with_event(&descriptor.clone().into_record(), ChangeKind::Added)?;
                }
            }

            // Then any other newly discovered implementation joins, keyed by
            // its version-insensitive instantiation reference.
            for descriptor in discovered.iter().filter(|d| d.legacy_id.is_none()) {
                let known = !usage
                    .query(|r: &RulesetRecord| {
                        base_ref(&r.instantiation_ref) == base_ref(&descriptor.instantiation_ref)
                    })?
                    .is_empty();
                if !known {
                    usage.put_with_event(&descriptor.clone().into_record(), ChangeKind::Added)?;
                }
            }

            // Consistency pass: every row, old and new, re-proves its
            // loadability.
            let mut available = 0usize;
            let mut unavailable = 0usize;
            for mut row in usage.all::<RulesetRecord>()? {
                let changed = match self.registry.instantiate_any_version(&row.instantiation_ref)
                {
                    Ok((current_ref, instance)) => {
                        available += 1;
                        let changed = !row.available
                            || row.name != instance.name()
                            || row.short_name != instance.short_name()
                            || row.instantiation_ref != current_ref;
                        row.name = instance.name().to_string();
                        row.short_name = instance.short_name().to_string();
                        row.instantiation_ref = current_ref;
                        row.available = true;
                        changed
                    }
                    Err(e) => {
                        unavailable += 1;
                        warn!(short_name = %row.short_name, error = %e, "ruleset unavailable");
                        let changed = row.available;
                        row.available = false;
                        changed
                    }
                };
                if changed {
                    usage.put_with_event(&row, ChangeKind::Updated)?;
                }
            }

            info!(available, unavailable, "ruleset catalog reconciled");
            Ok(())
        })
    }

    /// Retrieve an available ruleset by its reserved numeric id.
    pub fn get_by_id(&self, legacy_id: i32) -> StoreResult<Option<Live<RulesetRecord>>> {
        let hit = self
            .factory
            .read()
            .query(|r: &RulesetRecord| r.available && r.legacy_id == Some(legacy_id))?
            .into_iter()
            .next();
        hit.map(|r| self.factory.wrap(&r)).transpose()
    }

    /// Retrieve an available ruleset by short name.
    pub fn get_by_short_name(&self, short_name: &str) -> StoreResult<Option<Live<RulesetRecord>>> {
        let hit = self
            .factory
            .read()
            .query(|r: &RulesetRecord| r.available && r.short_name == short_name)?
            .into_iter()
            .next();
        hit.map(|r| self.factory.wrap(&r)).transpose()
    }

    /// All available rulesets, as live references.
    pub fn available_rulesets(&self) -> StoreResult<Vec<Live<RulesetRecord>>> {
        self.factory
            .read()
            .query(|r: &RulesetRecord| r.available)?
            .iter()
            .map(|r| self.factory.wrap(r))
            .collect()
    }

    /// Every catalog row, unavailable ones included.
    ///
    /// Unavailable rows keep their last-known identity so historical data
    /// (replays, scores) referencing a vanished ruleset still resolves.
    pub fn all_rulesets(&self) -> StoreResult<Vec<RulesetRecord>> {
        self.factory.read().all()
    }

    /// Instantiate the implementation behind a catalog row.
    pub fn create_instance(&self, record: &RulesetRecord) -> Result<Box<dyn Ruleset>, RulesetError> {
        self.registry
            .instantiate_any_version(&record.instantiation_ref)
            .map(|(_, instance)| instance)
    }

    /// The registry backing this store.
    pub fn registry(&self) -> &RulesetRegistry {
        &self.registry
    }

    /// The factory this store operates against.
    pub fn factory(&self) -> &ContextFactory {
        &self.factory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_store::StoreConfig;

    struct Stable;

    impl Ruleset for Stable {
        fn name(&self) -> &str {
            "Stable"
        }

        fn short_name(&self) -> &str {
            "stable"
        }

        fn legacy_id(&self) -> Option<i32> {
            Some(0)
        }
    }

    struct Classic;

    impl Ruleset for Classic {
        fn name(&self) -> &str {
            "Classic"
        }

        fn short_name(&self) -> &str {
            "classic"
        }

        fn legacy_id(&self) -> Option<i32> {
            Some(1)
        }
    }

    struct Modern;

    impl Ruleset for Modern {
        fn name(&self) -> &str {
            "Modern"
        }

        fn short_name(&self) -> &str {
            "modern"
        }
    }

    fn full_registry() -> RulesetRegistry {
        let mut registry = RulesetRegistry::new();
        registry.register("stable@1.0.0", || Stable).unwrap();
        registry.register("classic@1.0.0", || Classic).unwrap();
        registry.register("modern@1.0.0", || Modern).unwrap();
        registry
    }

    fn factory() -> ContextFactory {
        ContextFactory::open(StoreConfig::ephemeral()).unwrap()
    }

    #[test]
    fn fresh_catalog_resolves_all_discovered() {
        let store = RulesetStore::new(factory(), full_registry(), None).unwrap();

        let all = store.all_rulesets().unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|r| r.available));

        let stable = store.get_by_id(0).unwrap().unwrap();
        assert_eq!(stable.get().unwrap().unwrap().short_name, "stable");

        let classic = store.get_by_id(1).unwrap().unwrap();
        assert_eq!(classic.get().unwrap().unwrap().short_name, "classic");

        let modern = store.get_by_short_name("modern").unwrap().unwrap();
        assert_eq!(modern.get().unwrap().unwrap().legacy_id, None);
    }

    #[test]
    fn rediscovery_is_idempotent() {
        let store = RulesetStore::new(factory(), full_registry(), None).unwrap();
        let before = store.all_rulesets().unwrap().len();

        store.refresh().unwrap();
        store.refresh().unwrap();

        assert_eq!(store.all_rulesets().unwrap().len(), before);
    }

    #[test]
    fn reopening_against_same_catalog_is_idempotent() {
        let factory = factory();
        {
            RulesetStore::new(factory.clone(), full_registry(), None).unwrap();
        }
        let store = RulesetStore::new(factory, full_registry(), None).unwrap();
        assert_eq!(store.all_rulesets().unwrap().len(), 3);
    }

    #[test]
    fn vanished_ruleset_is_unavailable_but_keeps_identity() {
        let factory = factory();
        {
            RulesetStore::new(factory.clone(), full_registry(), None).unwrap();
        }

        // Next start: the modern ruleset's library is gone.
        let mut registry = RulesetRegistry::new();
        registry.register("stable@1.0.0", || Stable).unwrap();
        registry.register("classic@1.0.0", || Classic).unwrap();
        let store = RulesetStore::new(factory, registry, None).unwrap();

        // Excluded from available lookups...
        assert!(store.get_by_short_name("modern").unwrap().is_none());
        assert_eq!(store.available_rulesets().unwrap().len(), 2);

        // ...but the row survives with its identity intact.
        let row = store
            .all_rulesets()
            .unwrap()
            .into_iter()
            .find(|r| r.short_name == "modern")
            .unwrap();
        assert!(!row.available);
        assert_eq!(row.name, "Modern");
        assert_eq!(row.instantiation_ref, "modern@1.0.0");
    }

    #[test]
    fn availability_recovers_on_rediscovery() {
        let factory = factory();
        {
            RulesetStore::new(factory.clone(), full_registry(), None).unwrap();
        }
        {
            // One start without the modern ruleset...
            let mut registry = RulesetRegistry::new();
            registry.register("stable@1.0.0", || Stable).unwrap();
            RulesetStore::new(factory.clone(), registry, None).unwrap();
        }

        // ...and it comes back.
        let store = RulesetStore::new(factory, full_registry(), None).unwrap();
        assert!(store.get_by_short_name("modern").unwrap().is_some());
        assert_eq!(store.all_rulesets().unwrap().len(), 3);
    }

    #[test]
    fn legacy_ids_are_never_contested() {
        struct Impostor;

        impl Ruleset for Impostor {
            fn name(&self) -> &str {
                "Impostor"
            }

            fn short_name(&self) -> &str {
                "impostor"
            }

            fn legacy_id(&self) -> Option<i32> {
                Some(0)
            }
        }

        let factory = factory();
        {
            let mut registry = RulesetRegistry::new();
            registry.register("stable@1.0.0", || Stable).unwrap();
            RulesetStore::new(factory.clone(), registry, None).unwrap();
        }

        // A later-discovered implementation claiming id 0 must not insert.
        let mut registry = RulesetRegistry::new();
        registry.register("stable@1.0.0", || Stable).unwrap();
        registry.register("impostor@1.0.0", || Impostor).unwrap();
        let store = RulesetStore::new(factory, registry, None).unwrap();

        let rows = store.all_rulesets().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].short_name, "stable");
    }

    #[test]
    fn version_bump_refreshes_row_without_duplicating() {
        let factory = factory();
        {
            RulesetStore::new(factory.clone(), full_registry(), None).unwrap();
        }

        struct RenamedModern;

        impl Ruleset for RenamedModern {
            fn name(&self) -> &str {
                "Modern (rewritten)"
            }

            fn short_name(&self) -> &str {
                "modern"
            }
        }

        let mut registry = RulesetRegistry::new();
        registry.register("stable@1.0.0", || Stable).unwrap();
        registry.register("classic@1.0.0", || Classic).unwrap();
        registry
            .register("modern@2.0.0", || RenamedModern)
            .unwrap();
        let store = RulesetStore::new(factory, registry, None).unwrap();

        let rows = store.all_rulesets().unwrap();
        assert_eq!(rows.len(), 3);

        let modern = rows.into_iter().find(|r| r.short_name == "modern").unwrap();
        assert!(modern.available);
        assert_eq!(modern.name, "Modern (rewritten)");
        assert_eq!(modern.instantiation_ref, "modern@2.0.0");
    }

    #[test]
    fn create_instance_resolves_catalog_rows() {
        let store = RulesetStore::new(factory(), full_registry(), None).unwrap();
        let row = store
            .all_rulesets()
            .unwrap()
            .into_iter()
            .find(|r| r.short_name == "stable")
            .unwrap();

        let instance = store.create_instance(&row).unwrap();
        assert_eq!(instance.name(), "Stable");
    }

    #[test]
    fn scan_directory_without_libraries_changes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let store =
            RulesetStore::new(factory(), full_registry(), Some(dir.path())).unwrap();
        assert_eq!(store.all_rulesets().unwrap().len(), 3);
    }
}
