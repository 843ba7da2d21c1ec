//! Persisted record types
//!
//! Plain serde structs, one per asset collection. Every record owns an
//! [`EntityId`] assigned at construction; equality between two handles of
//! the same record type is primary-key equality, so two copies of the same
//! record compare equal even when their payload fields have diverged across
//! snapshots.

use crate::entity::{DeleteState, Entity, EntityKind, SoftDeletable};
use crate::id::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Implements `Entity` and primary-key equality for a record type.
macro_rules! entity_record {
    ($record:ident, $kind:expr) => {
        impl Entity for $record {
            const KIND: EntityKind = $kind;

            fn id(&self) -> EntityId {
                self.id
            }
        }

        impl PartialEq for $record {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Eq for $record {}
    };
}

/// Implements `SoftDeletable` for a record with a `delete_state` field.
macro_rules! soft_deletable {
    ($record:ident) => {
        impl SoftDeletable for $record {
            fn delete_state(&self) -> DeleteState {
                self.delete_state
            }

            fn set_delete_state(&mut self, state: DeleteState) {
                self.delete_state = state;
            }
        }
    };
}

/// Persisted descriptor for one ruleset implementation
///
/// `legacy_id` is permanently reserved for built-in implementations and is
/// a compatibility surface for external replay/score-matching consumers.
/// `available` is re-derived at every process start by the resolver's
/// consistency pass and never trusted from a prior run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetRecord {
    /// Primary key
    pub id: EntityId,
    /// Reserved numeric identity for built-in implementations
    pub legacy_id: Option<i32>,
    /// Human-readable name
    pub name: String,
    /// Stable short name used for lookups
    pub short_name: String,
    /// Reference the registry resolves back into a live instance
    pub instantiation_ref: String,
    /// Whether the implementation resolved at the last consistency pass
    pub available: bool,
}

impl RulesetRecord {
    /// Create a descriptor for a newly discovered implementation.
    ///
    /// New descriptors start unavailable; the consistency pass flips them
    /// once the implementation proves loadable.
    pub fn new(
        name: impl Into<String>,
        short_name: impl Into<String>,
        instantiation_ref: impl Into<String>,
        legacy_id: Option<i32>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            legacy_id,
            name: name.into(),
            short_name: short_name.into(),
            instantiation_ref: instantiation_ref.into(),
            available: false,
        }
    }
}

entity_record!(RulesetRecord, EntityKind::Ruleset);

/// A beatmap set: a group of difficulties sharing one song and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatmapSetRecord {
    /// Primary key
    pub id: EntityId,
    /// Identity on the online listing, when submitted
    pub online_id: Option<i32>,
    /// Song title
    pub title: String,
    /// Song artist
    pub artist: String,
    /// Mapper
    pub creator: String,
    /// Soft-delete state
    pub delete_state: DeleteState,
}

impl BeatmapSetRecord {
    /// Create a new beatmap set record
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        creator: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            online_id: None,
            title: title.into(),
            artist: artist.into(),
            creator: creator.into(),
            delete_state: DeleteState::Active,
        }
    }
}

entity_record!(BeatmapSetRecord, EntityKind::BeatmapSet);
soft_deletable!(BeatmapSetRecord);

/// A single beatmap difficulty belonging to a set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatmapRecord {
    /// Primary key
    pub id: EntityId,
    /// Parent beatmap set
    pub set_id: EntityId,
    /// Ruleset this difficulty targets
    pub ruleset_id: EntityId,
    /// Difficulty name
    pub difficulty_name: String,
    /// Content hash of the beatmap file
    pub hash: String,
    /// Playable length in milliseconds
    pub length_ms: f64,
    /// Most common BPM
    pub bpm: f64,
    /// Soft-delete state
    pub delete_state: DeleteState,
}

impl BeatmapRecord {
    /// Create a new beatmap record under `set_id` for `ruleset_id`
    pub fn new(
        set_id: EntityId,
        ruleset_id: EntityId,
        difficulty_name: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            set_id,
            ruleset_id,
            difficulty_name: difficulty_name.into(),
            hash: hash.into(),
            length_ms: 0.0,
            bpm: 0.0,
            delete_state: DeleteState::Active,
        }
    }
}

entity_record!(BeatmapRecord, EntityKind::Beatmap);
soft_deletable!(BeatmapRecord);

/// A score achieved on a beatmap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Primary key
    pub id: EntityId,
    /// Beatmap the score was set on
    pub beatmap_id: EntityId,
    /// Ruleset the score was played under
    pub ruleset_id: EntityId,
    /// Player name
    pub player: String,
    /// Total score
    pub total_score: i64,
    /// Accuracy in [0, 1]
    pub accuracy: f64,
    /// Highest combo reached
    pub max_combo: i32,
    /// When the score was achieved
    pub achieved_at: DateTime<Utc>,
    /// Soft-delete state
    pub delete_state: DeleteState,
}

impl ScoreRecord {
    /// Create a new score record
    pub fn new(beatmap_id: EntityId, ruleset_id: EntityId, player: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            beatmap_id,
            ruleset_id,
            player: player.into(),
            total_score: 0,
            accuracy: 0.0,
            max_combo: 0,
            achieved_at: Utc::now(),
            delete_state: DeleteState::Active,
        }
    }
}

entity_record!(ScoreRecord, EntityKind::Score);
soft_deletable!(ScoreRecord);

/// A skin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkinRecord {
    /// Primary key
    pub id: EntityId,
    /// Skin name
    pub name: String,
    /// Skin author
    pub creator: String,
    /// Soft-delete state
    pub delete_state: DeleteState,
}

impl SkinRecord {
    /// Create a new skin record
    pub fn new(name: impl Into<String>, creator: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            creator: creator.into(),
            delete_state: DeleteState::Active,
        }
    }
}

entity_record!(SkinRecord, EntityKind::Skin);
soft_deletable!(SkinRecord);

/// Bookkeeping record for one content-addressed file blob
///
/// The store tracks how many owning models reference each blob; the file
/// store's cleanup erases records whose count has dropped to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Primary key
    pub id: EntityId,
    /// Content hash addressing the blob on disk
    pub hash: String,
    /// Blob size in bytes
    pub size: u64,
    /// Number of live references from owning models
    pub reference_count: u32,
}

impl FileRecord {
    /// Create a new file record with a single reference
    pub fn new(hash: impl Into<String>, size: u64) -> Self {
        Self {
            id: EntityId::new(),
            hash: hash.into(),
            size,
            reference_count: 1,
        }
    }
}

entity_record!(FileRecord, EntityKind::File);

/// The catalog payload encoding is not self-describing, so free-form
/// values persist as JSON text.
mod json_text {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &serde_json::Value,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<serde_json::Value, D::Error> {
        let text = String::deserialize(deserializer)?;
        serde_json::from_str(&text).map_err(de::Error::custom)
    }
}

/// A free-form configuration setting
///
/// Settings are scoped by an optional ruleset and variant so that each
/// ruleset (and each of its play variants) keeps an independent namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingRecord {
    /// Primary key
    pub id: EntityId,
    /// Owning ruleset, or None for global settings
    pub ruleset_id: Option<EntityId>,
    /// Ruleset variant, when the ruleset distinguishes them
    pub variant: Option<i32>,
    /// Setting key
    pub key: String,
    /// Setting value
    #[serde(with = "json_text")]
    pub value: serde_json::Value,
}

impl SettingRecord {
    /// Create a new setting record
    pub fn new(
        ruleset_id: Option<EntityId>,
        variant: Option<i32>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            id: EntityId::new(),
            ruleset_id,
            variant,
            key: key.into(),
            value,
        }
    }
}

entity_record!(SettingRecord, EntityKind::Setting);

/// An input key binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindingRecord {
    /// Primary key
    pub id: EntityId,
    /// Owning ruleset, or None for global bindings
    pub ruleset_id: Option<EntityId>,
    /// Ruleset variant, when the ruleset distinguishes them
    pub variant: Option<i32>,
    /// Action identifier the binding triggers
    pub action: i32,
    /// Key combination, serialized in display form
    pub combination: String,
}

impl KeyBindingRecord {
    /// Create a new key binding record
    pub fn new(
        ruleset_id: Option<EntityId>,
        variant: Option<i32>,
        action: i32,
        combination: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            ruleset_id,
            variant,
            action,
            combination: combination.into(),
        }
    }
}

entity_record!(KeyBindingRecord, EntityKind::KeyBinding);
