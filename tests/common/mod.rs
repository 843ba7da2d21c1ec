//! Shared test utilities for the integration test suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use std::sync::Once;
use tempfile::TempDir;
use tempo::{
    BeatmapRecord, BeatmapSetRecord, ContextFactory, EntityId, ScoreRecord, StoreConfig,
};

static INIT_TRACING: Once = Once::new();

/// Route store logs into the test harness output.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Test store wrapper holding the factory and, for disk-backed stores,
/// the temporary directory keeping it alive.
pub struct TestStore {
    pub factory: ContextFactory,
    pub dir: Option<TempDir>,
}

impl TestStore {
    /// In-memory store for tests that never restart.
    pub fn ephemeral() -> Self {
        init_tracing();
        Self {
            factory: ContextFactory::open(StoreConfig::ephemeral()).unwrap(),
            dir: None,
        }
    }

    /// Disk-backed store in a fresh temporary directory.
    pub fn on_disk() -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        Self {
            factory: ContextFactory::open(StoreConfig::at(dir.path())).unwrap(),
            dir: Some(dir),
        }
    }

    /// Simulate a process restart: drop the factory, reopen from the same
    /// directory.
    pub fn reopen(self) -> Self {
        let TestStore { factory, dir } = self;
        drop(factory);
        let dir = dir.expect("reopen requires a disk-backed store");
        Self {
            factory: ContextFactory::open(StoreConfig::at(dir.path())).unwrap(),
            dir: Some(dir),
        }
    }
}

pub fn sample_set(title: &str) -> BeatmapSetRecord {
    BeatmapSetRecord::new(title, "artist", "mapper")
}

pub fn sample_beatmap(set: &BeatmapSetRecord, ruleset_id: EntityId, name: &str) -> BeatmapRecord {
    BeatmapRecord::new(set.id, ruleset_id, name, format!("hash-{name}"))
}

pub fn sample_score(beatmap: &BeatmapRecord, player: &str) -> ScoreRecord {
    let mut score = ScoreRecord::new(beatmap.id, beatmap.ruleset_id, player);
    score.total_score = 700_000;
    score.accuracy = 0.93;
    score.max_combo = 312;
    score
}
