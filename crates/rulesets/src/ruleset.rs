//! The self-describing ruleset plugin trait

use tempo_core::RulesetRecord;

/// A ruleset implementation.
///
/// Implementations describe themselves; the resolver derives catalog rows
/// from a live instance rather than trusting persisted metadata, so names
/// track the implementation across versions.
pub trait Ruleset: Send + Sync {
    /// Human-readable name shown to players
    fn name(&self) -> &str;

    /// Stable short name used for lookups and storage paths
    fn short_name(&self) -> &str;

    /// Reserved numeric identity, present only on built-in rulesets.
    ///
    /// Legacy ids are a compatibility surface for replay and score
    /// matching; they must stay stable across process restarts.
    fn legacy_id(&self) -> Option<i32> {
        None
    }
}

/// Metadata snapshot taken from one live ruleset instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesetDescriptor {
    /// Human-readable name
    pub name: String,
    /// Stable short name
    pub short_name: String,
    /// Reserved numeric identity for built-ins
    pub legacy_id: Option<i32>,
    /// Registry reference that instantiated this ruleset
    pub instantiation_ref: String,
}

impl RulesetDescriptor {
    /// Snapshot a live instance created from `instantiation_ref`.
    pub fn from_instance(ruleset: &dyn Ruleset, instantiation_ref: &str) -> Self {
        Self {
            name: ruleset.name().to_string(),
            short_name: ruleset.short_name().to_string(),
            legacy_id: ruleset.legacy_id(),
            instantiation_ref: instantiation_ref.to_string(),
        }
    }

    /// Build the catalog row for a newly discovered implementation.
    pub fn into_record(self) -> RulesetRecord {
        RulesetRecord::new(
            self.name,
            self.short_name,
            self.instantiation_ref,
            self.legacy_id,
        )
    }
}
