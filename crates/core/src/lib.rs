//! Core types for the tempo store
//!
//! This crate defines the foundational types shared by every layer:
//! - EntityId: stable primary key for persisted records
//! - Entity / SoftDeletable: trait seams between records and the store
//! - DeleteState: explicit soft-delete state machine
//! - The persisted record types (rulesets, beatmaps, scores, skins,
//!   files, settings, key bindings)
//! - StoreError / StoreResult: the shared error type

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod error;
pub mod id;
pub mod records;

pub use entity::{DeleteState, Entity, EntityKind, SoftDeletable};
pub use error::{StoreError, StoreResult};
pub use id::EntityId;
pub use records::{
    BeatmapRecord, BeatmapSetRecord, FileRecord, KeyBindingRecord, RulesetRecord, ScoreRecord,
    SettingRecord, SkinRecord,
};
