//! Embedded store for the tempo client
//!
//! This crate implements the store & live-reference subsystem:
//! - [`ContextFactory`]: exclusive owner of the catalog state and its
//!   on-disk snapshot file; hands out scoped read and write usages
//! - [`ReadUsage`] / [`WriteUsage`]: scoped borrows of a consistent view —
//!   any number of concurrent readers, exactly one writer process-wide
//! - [`Live`]: an identity capture that re-resolves into a live record from
//!   any thread, never a raw cross-thread handle
//! - [`ModelStore`]: generic CRUD + soft-delete + change notifications over
//!   one record collection
//! - Specialized stores: [`SettingsStore`], [`KeyBindingStore`],
//!   [`FileStore`]
//!
//! # Concurrency model
//!
//! Every operation is synchronous and blocks the calling thread. Read
//! usages never block and observe an immutable snapshot taken at
//! acquisition. Write usages serialize on a single global lock; all
//! mutations inside one usage publish atomically at commit, so no reader
//! ever observes a partial write. Only identity ([`EntityId`]) crosses
//! thread boundaries, carried by [`Live`] handles.
//!
//! [`EntityId`]: tempo_core::EntityId

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod factory;
mod files;
mod keybindings;
mod live;
mod persist;
mod settings;
mod snapshot;
mod store;
mod usage;

pub use config::StoreConfig;
pub use factory::ContextFactory;
pub use files::FileStore;
pub use keybindings::KeyBindingStore;
pub use live::Live;
pub use settings::SettingsStore;
pub use snapshot::{RecordKey, Snapshot, StoredRecord};
pub use store::{ModelStore, StoreEvent};
pub use usage::{ChangeKind, ReadUsage, WriteUsage};
