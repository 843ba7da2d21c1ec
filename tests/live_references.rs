//! Live references across execution contexts.

mod common;

use common::{sample_beatmap, sample_set, TestStore};
use std::thread;
use tempo::{Entity, EntityId, Live, ModelStore, ScoreRecord, SkinRecord, StoreError};

#[test]
fn wrap_resolve_round_trip() {
    let store = TestStore::ephemeral();
    let skins: ModelStore<SkinRecord> = ModelStore::new(store.factory.clone());

    let skin = SkinRecord::new("minimal", "someone");
    let live = skins.add(skin.clone()).unwrap();

    let resolved = live.get().unwrap().unwrap();
    assert_eq!(resolved.id(), skin.id());
    assert_eq!(resolved, skin);
}

#[test]
fn wrap_of_unpersisted_record_fails() {
    let store = TestStore::ephemeral();
    let skin = SkinRecord::new("unsaved", "someone");

    match store.factory.wrap(&skin) {
        Err(StoreError::NotPersisted { id, .. }) => assert_eq!(id, skin.id()),
        other => panic!("expected NotPersisted, got {other:?}"),
    }
}

#[test]
fn references_created_on_one_thread_resolve_on_another() {
    let store = TestStore::ephemeral();
    let sets = ModelStore::new(store.factory.clone());
    let beatmaps = ModelStore::new(store.factory.clone());

    let set = sample_set("cross-thread");
    let beatmap = sample_beatmap(&set, EntityId::new(), "insane");
    let set_live = sets.add(set).unwrap();
    let map_live = beatmaps.add(beatmap.clone()).unwrap();

    // Simulates handing work from an import worker to the UI thread: only
    // identity crosses, resolution happens over there.
    let handles: Vec<Live<tempo::BeatmapRecord>> = vec![map_live.clone(), map_live.clone()];
    let worker = thread::spawn(move || {
        handles
            .into_iter()
            .map(|live| live.get().unwrap().unwrap().difficulty_name)
            .collect::<Vec<_>>()
    });
    assert_eq!(worker.join().unwrap(), vec!["insane", "insane"]);

    // The set reference resolves on the main thread too.
    assert!(set_live.get().unwrap().is_some());
}

#[test]
fn mutation_from_a_background_thread_is_visible_everywhere() {
    let store = TestStore::ephemeral();
    let scores: ModelStore<ScoreRecord> = ModelStore::new(store.factory.clone());

    let score = ScoreRecord::new(EntityId::new(), EntityId::new(), "player");
    let live = scores.add(score).unwrap();

    let background = live.clone();
    thread::spawn(move || {
        background
            .perform_write(|s| {
                s.total_score = 999_999;
                s.max_combo = 777;
            })
            .unwrap();
    })
    .join()
    .unwrap();

    let resolved = live.get().unwrap().unwrap();
    assert_eq!(resolved.total_score, 999_999);
    assert_eq!(resolved.max_combo, 777);
}

#[test]
fn resolution_survives_the_originating_context() {
    let store = TestStore::ephemeral();
    let skins: ModelStore<SkinRecord> = ModelStore::new(store.factory.clone());

    let live = {
        // The usage (and thread) that created the record are long gone by
        // the time the reference resolves.
        let factory = store.factory.clone();
        thread::spawn(move || {
            let skins: ModelStore<SkinRecord> = ModelStore::new(factory);
            skins.add(SkinRecord::new("orphan", "someone")).unwrap()
        })
        .join()
        .unwrap()
    };

    assert!(live.get().unwrap().is_some());
    assert_eq!(skins.all().unwrap().len(), 1);
}

#[test]
fn absence_is_a_normal_outcome() {
    let store = TestStore::ephemeral();
    let skins: ModelStore<SkinRecord> = ModelStore::new(store.factory.clone());

    let live = skins.add(SkinRecord::new("fleeting", "someone")).unwrap();
    skins.remove(&live).unwrap();
    // Soft-deleted records still resolve; they exist until purged.
    assert!(live.get().unwrap().is_some());

    skins.purge(live.id()).unwrap();
    assert!(live.get().unwrap().is_none());
    assert!(!live.perform_write(|_| {}).unwrap());
}

#[test]
fn equality_follows_captured_identity() {
    let store = TestStore::ephemeral();
    let skins: ModelStore<SkinRecord> = ModelStore::new(store.factory.clone());

    let skin = SkinRecord::new("same", "someone");
    let live = skins.add(skin.clone()).unwrap();
    let rewrapped = store.factory.wrap(&skin).unwrap();

    assert_eq!(live, rewrapped);
    assert_eq!(live.id(), skin.id());
}
