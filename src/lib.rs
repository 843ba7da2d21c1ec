//! Tempo - embedded store and live-reference core for a rhythm game client
//!
//! Tempo manages large collections of persisted client assets (rulesets,
//! beatmaps, scores, skins, key bindings, settings) in one embedded
//! transactional store, accessed concurrently from the UI, background
//! import workers and the audio thread.
//!
//! # Quick Start
//!
//! ```ignore
//! use tempo::{ContextFactory, ModelStore, StoreConfig, SkinRecord};
//!
//! // Open the client store (or StoreConfig::ephemeral() for tests)
//! let factory = ContextFactory::open(StoreConfig::at("/data/client"))?;
//!
//! // Collection stores share the one factory
//! let skins = ModelStore::<SkinRecord>::new(factory.clone());
//! let live = skins.add(SkinRecord::new("minimal", "someone"))?;
//!
//! // Live references resolve from any thread
//! std::thread::spawn(move || {
//!     let skin = live.get().unwrap();
//! });
//! ```
//!
//! # Architecture
//!
//! All catalog access funnels through the [`ContextFactory`]'s usage
//! protocol: read usages never block and observe immutable snapshots;
//! write usages serialize on one global lock and publish atomically.
//! Records cross thread boundaries only as [`Live`] identity captures.
//! The [`RulesetStore`] reconciles discovered plugin implementations
//! against the persisted catalog at startup.

// Re-export the public API from the workspace crates
pub use tempo_core::*;
pub use tempo_rulesets::*;
pub use tempo_store::*;
