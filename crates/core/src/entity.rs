//! Entity traits and the soft-delete state machine
//!
//! `EntityKind` discriminates record types inside the unified catalog, the
//! same way a type tag discriminates values in a unified keyspace. The
//! `Entity` trait binds a record type to its kind; `SoftDeletable` exposes
//! the delete-state accessors for record types that support soft deletion.

use crate::id::EntityId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator for record types within the unified catalog
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EntityKind {
    /// Ruleset descriptor
    Ruleset,
    /// Beatmap set (a group of difficulties sharing metadata)
    BeatmapSet,
    /// Single beatmap difficulty
    Beatmap,
    /// Score achieved on a beatmap
    Score,
    /// Skin
    Skin,
    /// Content-addressed file bookkeeping record
    File,
    /// Free-form configuration setting
    Setting,
    /// Input key binding
    KeyBinding,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Ruleset => "ruleset",
            EntityKind::BeatmapSet => "beatmap set",
            EntityKind::Beatmap => "beatmap",
            EntityKind::Score => "score",
            EntityKind::Skin => "skin",
            EntityKind::File => "file",
            EntityKind::Setting => "setting",
            EntityKind::KeyBinding => "key binding",
        };
        write!(f, "{name}")
    }
}

/// Soft-delete state machine
///
/// ```text
/// Active → PendingDelete { since }   (remove)
/// PendingDelete → Active             (restore)
/// PendingDelete → purged             (cleanup erases the record)
/// ```
///
/// The transition timestamp is captured when the record enters
/// `PendingDelete` and drives the cleanup retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeleteState {
    /// Live record, visible to default queries
    #[default]
    Active,
    /// Marked for deletion; reversible until purged
    PendingDelete {
        /// When the record entered the pending state
        since: DateTime<Utc>,
    },
}

impl DeleteState {
    /// Whether the record is live
    pub fn is_active(&self) -> bool {
        matches!(self, DeleteState::Active)
    }

    /// Whether the record is marked for deletion
    pub fn is_pending(&self) -> bool {
        matches!(self, DeleteState::PendingDelete { .. })
    }

    /// Timestamp of the pending-delete transition, if any
    pub fn pending_since(&self) -> Option<DateTime<Utc>> {
        match self {
            DeleteState::Active => None,
            DeleteState::PendingDelete { since } => Some(*since),
        }
    }
}

/// A persisted record type
///
/// Implementors are plain serde structs whose primary key is assigned at
/// construction and never changes.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The catalog discriminator for this record type
    const KIND: EntityKind;

    /// The record's primary key
    fn id(&self) -> EntityId;
}

/// A record type participating in the soft-delete state machine
pub trait SoftDeletable: Entity {
    /// Current delete state
    fn delete_state(&self) -> DeleteState;

    /// Overwrite the delete state (transition enforcement lives in the store)
    fn set_delete_state(&mut self, state: DeleteState);

    /// Whether the record is pending deletion
    fn is_deleted(&self) -> bool {
        self.delete_state().is_pending()
    }
}
