//! Input key bindings over the shared factory

use crate::factory::ContextFactory;
use crate::usage::ChangeKind;
use tempo_core::{EntityId, KeyBindingRecord, StoreResult};
use tracing::debug;

/// Store for input key bindings.
///
/// Rulesets register their default bindings at startup;
/// [`KeyBindingStore::register_defaults`] only inserts combinations for
/// actions that have no record yet, so user-modified bindings survive
/// every restart and every ruleset update.
pub struct KeyBindingStore {
    factory: ContextFactory,
}

impl KeyBindingStore {
    /// Create a key binding store against an explicit factory.
    pub fn new(factory: ContextFactory) -> Self {
        Self { factory }
    }

    /// Insert default bindings for any action not yet present in the
    /// given scope. Returns how many bindings were inserted.
    ///
    /// Idempotent: re-registering the same defaults inserts nothing.
    pub fn register_defaults(
        &self,
        ruleset_id: Option<EntityId>,
        variant: Option<i32>,
        defaults: &[(i32, &str)],
    ) -> StoreResult<usize> {
        self.factory.with_write(|usage| {
            let existing: Vec<i32> = usage
                .query(|b: &KeyBindingRecord| b.ruleset_id == ruleset_id && b.variant == variant)?
                .into_iter()
                .map(|b| b.action)
                .collect();

            let mut inserted = 0;
            for (action, combination) in defaults {
                if existing.contains(action) {
                    continue;
                }
                let record =
                    KeyBindingRecord::new(ruleset_id, variant, *action, *combination);
                usage.put_with_event(&record, ChangeKind::Added)?;
                inserted += 1;
            }
            if inserted > 0 {
                debug!(inserted, "registered default key bindings");
            }
            Ok(inserted)
        })
    }

    /// All bindings within one scope, ordered by primary key.
    pub fn bindings_for(
        &self,
        ruleset_id: Option<EntityId>,
        variant: Option<i32>,
    ) -> StoreResult<Vec<KeyBindingRecord>> {
        self.factory
            .read()
            .query(|b: &KeyBindingRecord| b.ruleset_id == ruleset_id && b.variant == variant)
    }

    /// Rebind one action to a new combination.
    ///
    /// Returns `Ok(false)` when the binding record no longer exists.
    pub fn set_combination(&self, id: EntityId, combination: &str) -> StoreResult<bool> {
        self.factory.with_write(|usage| {
            let Some(mut record) = usage.get::<KeyBindingRecord>(id)? else {
                return Ok(false);
            };
            record.combination = combination.to_string();
            usage.put_with_event(&record, ChangeKind::Updated)?;
            Ok(true)
        })
    }
}
