//! Keyed configuration settings over the shared factory

use crate::factory::ContextFactory;
use crate::usage::ChangeKind;
use tempo_core::{EntityId, SettingRecord, StoreResult};

/// Store for free-form configuration settings.
///
/// Settings live in independent namespaces scoped by `(ruleset, variant)`;
/// global settings use `(None, None)`. `set` is an upsert: one write usage
/// either rewrites the existing record or inserts a fresh one.
pub struct SettingsStore {
    factory: ContextFactory,
}

impl SettingsStore {
    /// Create a settings store against an explicit factory.
    pub fn new(factory: ContextFactory) -> Self {
        Self { factory }
    }

    /// Fetch a setting's value within one scope.
    pub fn get(
        &self,
        ruleset_id: Option<EntityId>,
        variant: Option<i32>,
        key: &str,
    ) -> StoreResult<Option<serde_json::Value>> {
        Ok(self
            .factory
            .read()
            .query(|s: &SettingRecord| {
                s.ruleset_id == ruleset_id && s.variant == variant && s.key == key
            })?
            .into_iter()
            .next()
            .map(|s| s.value))
    }

    /// Upsert a setting within one scope.
    pub fn set(
        &self,
        ruleset_id: Option<EntityId>,
        variant: Option<i32>,
        key: &str,
        value: serde_json::Value,
    ) -> StoreResult<()> {
        self.factory.with_write(|usage| {
            let existing = usage
                .query(|s: &SettingRecord| {
                    s.ruleset_id == ruleset_id && s.variant == variant && s.key == key
                })?
                .into_iter()
                .next();

            match existing {
                Some(mut record) => {
                    record.value = value;
                    usage.put_with_event(&record, ChangeKind::Updated)
                }
                None => {
                    let record = SettingRecord::new(ruleset_id, variant, key, value);
                    usage.put_with_event(&record, ChangeKind::Added)
                }
            }
        })
    }

    /// All settings within one scope, ordered by primary key.
    pub fn all_for(
        &self,
        ruleset_id: Option<EntityId>,
        variant: Option<i32>,
    ) -> StoreResult<Vec<SettingRecord>> {
        self.factory
            .read()
            .query(|s: &SettingRecord| s.ruleset_id == ruleset_id && s.variant == variant)
    }
}
