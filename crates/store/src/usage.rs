//! Scoped read and write usages
//!
//! A usage is a scoped borrow of a consistent catalog view:
//!
//! - [`ReadUsage`] wraps an immutable snapshot. Many may be outstanding at
//!   once, from any thread, concurrently with the writer.
//! - [`WriteUsage`] owns the single global write lock plus a working copy
//!   of the catalog. Mutations buffer in the copy and publish atomically at
//!   [`WriteUsage::commit`]; dropping the usage without committing discards
//!   them and releases the lock, which is also what happens when a panic
//!   unwinds through the scope.
//!
//! Every operation checks that the usage's context generation is still
//! current, so a usage that outlives a schema migration surfaces
//! [`StoreError::Stale`] instead of returning data from a pre-migration
//! layout.

use crate::factory::{FactoryShared, WriteGuard};
use crate::snapshot::{Catalog, RecordKey, Snapshot, StoredRecord};
use smallvec::SmallVec;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempo_core::{Entity, EntityId, EntityKind, StoreError, StoreResult};
use tracing::{debug, trace};

/// The semantic state transition a change event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A record entered the collection
    Added,
    /// A record left the visible collection (soft delete included)
    Removed,
    /// A record's payload changed (restore included)
    Updated,
}

/// One buffered change event, dispatched after commit
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingEvent {
    pub kind: EntityKind,
    pub change: ChangeKind,
    pub id: EntityId,
}

/// Scoped read-only borrow of a catalog snapshot
pub struct ReadUsage {
    snapshot: Snapshot,
    shared: Arc<FactoryShared>,
}

impl ReadUsage {
    pub(crate) fn new(snapshot: Snapshot, shared: Arc<FactoryShared>) -> Self {
        Self { snapshot, shared }
    }

    fn ensure_current(&self) -> StoreResult<()> {
        let current = self.shared.generation.load(Ordering::SeqCst);
        if self.snapshot.generation() != current {
            return Err(StoreError::Stale {
                held: self.snapshot.generation(),
                current,
            });
        }
        Ok(())
    }

    /// Commit version of the snapshot this usage observes
    pub fn version(&self) -> u64 {
        self.snapshot.version()
    }

    /// Fetch one record by primary key
    pub fn get<E: Entity>(&self, id: EntityId) -> StoreResult<Option<E>> {
        self.ensure_current()?;
        match self.snapshot.get(&RecordKey::of::<E>(id)) {
            Some(record) => Ok(Some(record.decode()?)),
            None => Ok(None),
        }
    }

    /// Whether a record with this primary key exists
    pub fn contains<E: Entity>(&self, id: EntityId) -> StoreResult<bool> {
        self.ensure_current()?;
        Ok(self.snapshot.get(&RecordKey::of::<E>(id)).is_some())
    }

    /// All records of one type, ordered by primary key
    pub fn all<E: Entity>(&self) -> StoreResult<Vec<E>> {
        self.ensure_current()?;
        self.snapshot
            .scan_kind(E::KIND)
            .map(|(_, record)| record.decode())
            .collect()
    }

    /// Records of one type matching a predicate
    pub fn query<E: Entity>(&self, predicate: impl Fn(&E) -> bool) -> StoreResult<Vec<E>> {
        Ok(self.all::<E>()?.into_iter().filter(|e| predicate(e)).collect())
    }
}

/// Scoped exclusive borrow for mutation
///
/// Holds the global write lock for its whole scope. At most one exists
/// system-wide at any instant; a second requester blocks in
/// [`ContextFactory::write`] until this one commits or is dropped.
///
/// [`ContextFactory::write`]: crate::ContextFactory::write
pub struct WriteUsage {
    /// Owned lock guard; taken at commit so events dispatch lock-free.
    guard: Option<WriteGuard>,
    shared: Arc<FactoryShared>,
    working: Catalog,
    commit_version: u64,
    generation: u64,
    events: SmallVec<[PendingEvent; 4]>,
    committed: bool,
}

impl WriteUsage {
    pub(crate) fn new(
        guard: WriteGuard,
        shared: Arc<FactoryShared>,
        working: Catalog,
        base_version: u64,
        generation: u64,
    ) -> Self {
        Self {
            guard: Some(guard),
            shared,
            working,
            commit_version: base_version + 1,
            generation,
            events: SmallVec::new(),
            committed: false,
        }
    }

    fn ensure_current(&self) -> StoreResult<()> {
        let current = self.shared.generation.load(Ordering::SeqCst);
        if self.generation != current {
            return Err(StoreError::Stale {
                held: self.generation,
                current,
            });
        }
        Ok(())
    }

    /// Commit version this usage will publish at
    pub fn version(&self) -> u64 {
        self.commit_version
    }

    /// Fetch one record, observing buffered mutations
    pub fn get<E: Entity>(&self, id: EntityId) -> StoreResult<Option<E>> {
        self.ensure_current()?;
        match self.working.get(&RecordKey::of::<E>(id)) {
            Some(record) => Ok(Some(record.decode()?)),
            None => Ok(None),
        }
    }

    /// Whether a record with this primary key exists in the working copy
    pub fn contains<E: Entity>(&self, id: EntityId) -> StoreResult<bool> {
        self.ensure_current()?;
        Ok(self.working.contains_key(&RecordKey::of::<E>(id)))
    }

    /// All records of one type in the working copy
    pub fn all<E: Entity>(&self) -> StoreResult<Vec<E>> {
        self.ensure_current()?;
        self.working
            .iter()
            .filter(|(key, _)| key.kind == E::KIND)
            .map(|(_, record)| record.decode())
            .collect()
    }

    /// Records of one type matching a predicate, buffered mutations included
    pub fn query<E: Entity>(&self, predicate: impl Fn(&E) -> bool) -> StoreResult<Vec<E>> {
        Ok(self.all::<E>()?.into_iter().filter(|e| predicate(e)).collect())
    }

    /// Upsert a record, deriving the event from prior presence
    /// (absent ⇒ `Added`, present ⇒ `Updated`).
    pub fn put<E: Entity>(&mut self, entity: &E) -> StoreResult<()> {
        let change = if self.working.contains_key(&RecordKey::of::<E>(entity.id())) {
            ChangeKind::Updated
        } else {
            ChangeKind::Added
        };
        self.put_with_event(entity, change)
    }

    /// Upsert a record, reporting the given semantic transition.
    ///
    /// Model-level soft deletion is an update at this layer but a removal
    /// to listeners; callers supply the transition they mean.
    pub fn put_with_event<E: Entity>(&mut self, entity: &E, change: ChangeKind) -> StoreResult<()> {
        self.ensure_current()?;
        let record = StoredRecord::encode(entity, self.commit_version)?;
        self.working.insert(RecordKey::of::<E>(entity.id()), record);
        self.events.push(PendingEvent {
            kind: E::KIND,
            change,
            id: entity.id(),
        });
        Ok(())
    }

    /// Erase a record without reporting any event (the purge path: the
    /// removal event already fired at soft-delete time).
    pub fn remove_raw<E: Entity>(&mut self, id: EntityId) -> StoreResult<bool> {
        self.ensure_current()?;
        Ok(self.working.remove(&RecordKey::of::<E>(id)).is_some())
    }

    /// Erase a record, reporting the given transition if it was present.
    pub fn remove_with_event<E: Entity>(
        &mut self,
        id: EntityId,
        change: ChangeKind,
    ) -> StoreResult<bool> {
        self.ensure_current()?;
        let removed = self.working.remove(&RecordKey::of::<E>(id)).is_some();
        if removed {
            self.events.push(PendingEvent {
                kind: E::KIND,
                change,
                id,
            });
        }
        Ok(removed)
    }

    /// Commit every buffered mutation atomically.
    ///
    /// Rewrites the snapshot file first (durability), then swaps the
    /// published snapshot (visibility), then releases the write lock and
    /// dispatches buffered change events. If persistence fails, nothing
    /// becomes visible and the error propagates; the dropped usage releases
    /// the lock.
    pub fn commit(mut self) -> StoreResult<u64> {
        self.ensure_current()?;
        let version = self.commit_version;

        if let Some(file) = self.shared.file.lock().as_ref() {
            file.write(self.shared.config.schema_version, version, &self.working)?;
        }

        let data = Arc::new(std::mem::take(&mut self.working));
        {
            let mut published = self.shared.live.write();
            published.version = version;
            published.data = data;
        }
        self.committed = true;
        debug!(version, events = self.events.len(), "write usage committed");

        // Release the write lock before dispatching so listeners can open
        // their own usages without deadlocking.
        self.guard = None;

        let events = std::mem::take(&mut self.events);
        for event in events {
            self.shared.dispatch(event.kind, event.change, event.id);
        }
        Ok(version)
    }
}

impl Drop for WriteUsage {
    fn drop(&mut self) {
        if !self.committed {
            trace!(
                buffered = self.events.len(),
                "write usage dropped without commit; mutations discarded"
            );
        }
    }
}
