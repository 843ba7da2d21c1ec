//! Immutable point-in-time views of the catalog
//!
//! The catalog is one ordered map from [`RecordKey`] (kind + primary key)
//! to [`StoredRecord`] (commit version + encoded payload). A [`Snapshot`]
//! wraps an `Arc` of that map together with the commit version and context
//! generation it was taken at.
//!
//! # Snapshot guarantees
//!
//! - Committed data as of the snapshot's commit version
//! - Repeatable reads (the same key always returns the same value)
//! - Never shows writes committed after creation, uncommitted buffered
//!   writes from the active write usage, or partial commits
//!
//! # Known limitations
//!
//! Publishing a new snapshot clones the whole map inside the committing
//! write usage, so writes cost O(catalog size). Client catalogs are small
//! (tens of thousands of records) and writes are rare relative to reads,
//! which makes the copy acceptable; the `Arc` swap keeps read acquisition
//! O(1).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempo_core::{Entity, EntityId, EntityKind, StoreResult};

/// Composite catalog key: record kind plus primary key
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RecordKey {
    /// Record kind
    pub kind: EntityKind,
    /// Primary key
    pub id: EntityId,
}

impl RecordKey {
    /// Create a key from an explicit kind and id
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }

    /// Create a key for a record type's kind
    pub fn of<E: Entity>(id: EntityId) -> Self {
        Self::new(E::KIND, id)
    }
}

/// One encoded record plus the commit version that last wrote it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Commit version of the write usage that last wrote this record
    pub version: u64,
    /// Bincode-encoded record payload
    pub payload: Vec<u8>,
}

impl StoredRecord {
    /// Encode a record at the given commit version
    pub fn encode<E: Entity>(entity: &E, version: u64) -> StoreResult<Self> {
        Ok(Self {
            version,
            payload: bincode::serialize(entity)?,
        })
    }

    /// Decode the payload back into a record
    pub fn decode<E: Entity>(&self) -> StoreResult<E> {
        Ok(bincode::deserialize(&self.payload)?)
    }
}

/// The full catalog map
pub(crate) type Catalog = BTreeMap<RecordKey, StoredRecord>;

/// Immutable point-in-time view of the catalog
#[derive(Clone)]
pub struct Snapshot {
    version: u64,
    generation: u64,
    data: Arc<Catalog>,
}

impl Snapshot {
    pub(crate) fn new(version: u64, generation: u64, data: Arc<Catalog>) -> Self {
        Self {
            version,
            generation,
            data,
        }
    }

    /// Commit version this snapshot was taken at
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Context generation this snapshot was taken at
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of records across all kinds
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fetch the stored form of one record, if present.
    pub fn get(&self, key: &RecordKey) -> Option<&StoredRecord> {
        self.data.get(key)
    }

    /// Iterate records of one kind. BTreeMap iteration is ordered, so
    /// results come back sorted by primary key.
    pub(crate) fn scan_kind(
        &self,
        kind: EntityKind,
    ) -> impl Iterator<Item = (&RecordKey, &StoredRecord)> {
        self.data.iter().filter(move |(k, _)| k.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    // A snapshot crosses threads inside read usages and live references.
    static_assertions::assert_impl_all!(super::Snapshot: Send, Sync);

    use super::*;
    use tempo_core::SkinRecord;

    fn snapshot_with(records: &[SkinRecord]) -> Snapshot {
        let mut data = Catalog::new();
        for (i, r) in records.iter().enumerate() {
            data.insert(
                RecordKey::of::<SkinRecord>(r.id()),
                StoredRecord::encode(r, i as u64 + 1).unwrap(),
            );
        }
        Snapshot::new(records.len() as u64, 0, Arc::new(data))
    }

    #[test]
    fn empty_snapshot() {
        let snap = Snapshot::new(7, 0, Arc::new(Catalog::new()));
        assert_eq!(snap.version(), 7);
        assert!(snap.is_empty());
        assert_eq!(snap.len(), 0);
    }

    #[test]
    fn get_returns_stored_record() {
        let skin = SkinRecord::new("classic", "someone");
        let snap = snapshot_with(std::slice::from_ref(&skin));

        let stored = snap.get(&RecordKey::of::<SkinRecord>(skin.id())).unwrap();
        let decoded: SkinRecord = stored.decode().unwrap();
        assert_eq!(decoded, skin);
        assert_eq!(decoded.name, "classic");
    }

    #[test]
    fn scan_kind_filters_other_kinds() {
        let skin = SkinRecord::new("classic", "someone");
        let snap = snapshot_with(std::slice::from_ref(&skin));

        assert_eq!(snap.scan_kind(EntityKind::Skin).count(), 1);
        assert_eq!(snap.scan_kind(EntityKind::Score).count(), 0);
    }

    #[test]
    fn encode_decode_round_trip() {
        let skin = SkinRecord::new("minimal", "author");
        let stored = StoredRecord::encode(&skin, 42).unwrap();
        assert_eq!(stored.version, 42);

        let back: SkinRecord = stored.decode().unwrap();
        assert_eq!(back, skin);
        assert_eq!(back.creator, "author");
    }

    #[test]
    fn record_key_ordering_groups_by_kind() {
        let a = RecordKey::new(EntityKind::Ruleset, EntityId::new());
        let b = RecordKey::new(EntityKind::Score, EntityId::new());
        // Ruleset precedes Score in the kind ordering, whatever the ids.
        assert!(a < b);
    }
}
