//! Store semantics across collections sharing one factory.

mod common;

use common::{sample_beatmap, sample_set, TestStore};
use proptest::prelude::*;
use tempo::{
    Entity, EntityId, ModelStore, RecordKey, SkinRecord, StoreError,
};

#[test]
fn collections_share_one_commit_history() {
    let store = TestStore::ephemeral();
    let sets = ModelStore::new(store.factory.clone());
    let skins = ModelStore::new(store.factory.clone());

    sets.add(sample_set("first")).unwrap();
    assert_eq!(store.factory.commit_version(), 1);

    skins.add(SkinRecord::new("minimal", "someone")).unwrap();
    assert_eq!(store.factory.commit_version(), 2);

    // Each collection only sees its own records.
    assert_eq!(sets.all().unwrap().len(), 1);
    assert_eq!(skins.all().unwrap().len(), 1);
}

#[test]
fn mixed_collection_write_is_atomic() {
    let store = TestStore::ephemeral();
    let ruleset_id = EntityId::new();
    let set = sample_set("bundle");
    let beatmap = sample_beatmap(&set, ruleset_id, "hard");

    store
        .factory
        .with_write(|usage| {
            usage.put(&set)?;
            usage.put(&beatmap)
        })
        .unwrap();

    let snapshot = store.factory.snapshot();
    let set_version = snapshot
        .get(&RecordKey::of::<tempo::BeatmapSetRecord>(set.id))
        .unwrap()
        .version;
    let map_version = snapshot
        .get(&RecordKey::of::<tempo::BeatmapRecord>(beatmap.id))
        .unwrap()
        .version;
    assert_eq!(set_version, map_version);
}

#[test]
fn failed_mixed_write_leaves_no_trace() {
    let store = TestStore::ephemeral();
    let set = sample_set("doomed");

    let result = store.factory.with_write(|usage| {
        usage.put(&set)?;
        Err::<(), _>(StoreError::InvalidOperation("import failed".into()))
    });

    assert!(result.is_err());
    assert!(store
        .factory
        .read()
        .get::<tempo::BeatmapSetRecord>(set.id)
        .unwrap()
        .is_none());
    assert_eq!(store.factory.commit_version(), 0);
}

#[test]
fn query_predicates_compose_with_soft_delete() {
    let store = TestStore::ephemeral();
    let skins: ModelStore<SkinRecord> = ModelStore::new(store.factory.clone());

    let keep = skins.add(SkinRecord::new("keep", "a")).unwrap();
    let hide = skins.add(SkinRecord::new("hide", "a")).unwrap();
    skins.remove(&hide).unwrap();

    let visible = skins.query(|s| s.creator == "a").unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id(), keep.id());

    let everything = skins.query_including_pending(|s| s.creator == "a").unwrap();
    assert_eq!(everything.len(), 2);
}

proptest! {
    // Every record committed in one usage carries the same commit version,
    // whatever the batch looks like.
    #[test]
    fn batch_commits_are_atomic(names in prop::collection::vec("[a-z]{1,12}", 1..20)) {
        let store = TestStore::ephemeral();
        let records: Vec<SkinRecord> =
            names.iter().map(|n| SkinRecord::new(n.clone(), "prop")).collect();

        store
            .factory
            .with_write(|usage| {
                for record in &records {
                    usage.put(record)?;
                }
                Ok(())
            })
            .unwrap();

        let snapshot = store.factory.snapshot();
        for record in &records {
            let stored = snapshot.get(&RecordKey::of::<SkinRecord>(record.id)).unwrap();
            prop_assert_eq!(stored.version, 1);
        }
    }
}
