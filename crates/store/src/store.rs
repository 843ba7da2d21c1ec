//! Generic model store: CRUD, soft delete, change notifications
//!
//! A [`ModelStore`] layers collection semantics over the factory's usage
//! protocol for one soft-deletable record type:
//!
//! - removal is a reversible soft delete (`Active → PendingDelete`),
//!   purged for good by [`ModelStore::cleanup`] once the retention window
//!   expires
//! - every state transition fires exactly one change event, carrying a
//!   [`Live`] handle rather than a record, since listeners may run far from
//!   the thread that wrote
//! - the store itself never cascades to dependent collections; cascade
//!   rules belong to collaborators subscribed to `Removed`/`Updated`, who
//!   resolve the handle in their own context and react through their own
//!   usages

use crate::factory::ContextFactory;
use crate::live::Live;
use crate::usage::ChangeKind;
use chrono::Utc;
use std::marker::PhantomData;
use std::sync::Arc;
use tempo_core::{DeleteState, Entity, EntityId, SoftDeletable, StoreError, StoreResult};
use tracing::info;

/// A change notification for one record collection
#[derive(Debug, Clone)]
pub enum StoreEvent<E: Entity> {
    /// A record entered the collection
    Added(Live<E>),
    /// A record was soft-deleted out of the visible collection
    Removed(Live<E>),
    /// A record's payload changed, or it was restored
    Updated(Live<E>),
}

impl<E: Entity> StoreEvent<E> {
    /// The live handle carried by this event
    pub fn live(&self) -> &Live<E> {
        match self {
            StoreEvent::Added(live) | StoreEvent::Removed(live) | StoreEvent::Updated(live) => live,
        }
    }

    /// The transition this event reports
    pub fn change(&self) -> ChangeKind {
        match self {
            StoreEvent::Added(_) => ChangeKind::Added,
            StoreEvent::Removed(_) => ChangeKind::Removed,
            StoreEvent::Updated(_) => ChangeKind::Updated,
        }
    }
}

/// Generic store over one soft-deletable record collection
pub struct ModelStore<E: SoftDeletable> {
    factory: ContextFactory,
    _entity: PhantomData<fn() -> E>,
}

impl<E: SoftDeletable> ModelStore<E> {
    /// Create a store against an explicit factory.
    pub fn new(factory: ContextFactory) -> Self {
        Self {
            factory,
            _entity: PhantomData,
        }
    }

    /// The factory this store operates against
    pub fn factory(&self) -> &ContextFactory {
        &self.factory
    }

    /// Persist a new record, firing `Added`.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidOperation`] if a record with the same primary
    /// key already exists.
    pub fn add(&self, entity: E) -> StoreResult<Live<E>> {
        self.factory.with_write(|usage| {
            if usage.contains::<E>(entity.id())? {
                return Err(StoreError::InvalidOperation(format!(
                    "{} record {} is already persisted",
                    E::KIND,
                    entity.id()
                )));
            }
            usage.put_with_event(&entity, ChangeKind::Added)
        })?;
        self.factory.wrap(&entity)
    }

    /// Soft-delete a record, firing `Removed`.
    ///
    /// Returns `Ok(false)` when the record is missing or already pending
    /// deletion; the event fires exactly once per transition.
    pub fn remove(&self, item: &Live<E>) -> StoreResult<bool> {
        self.factory.with_write(|usage| {
            let Some(mut entity) = usage.get::<E>(item.id())? else {
                return Ok(false);
            };
            if entity.is_deleted() {
                return Ok(false);
            }
            entity.set_delete_state(DeleteState::PendingDelete { since: Utc::now() });
            usage.put_with_event(&entity, ChangeKind::Removed)?;
            Ok(true)
        })
    }

    /// Undelete a pending record, firing `Updated`.
    ///
    /// Returns `Ok(false)` when the record is missing or already active.
    pub fn restore(&self, item: &Live<E>) -> StoreResult<bool> {
        self.factory.with_write(|usage| {
            let Some(mut entity) = usage.get::<E>(item.id())? else {
                return Ok(false);
            };
            if !entity.is_deleted() {
                return Ok(false);
            }
            entity.set_delete_state(DeleteState::Active);
            usage.put_with_event(&entity, ChangeKind::Updated)?;
            Ok(true)
        })
    }

    /// Mutate a record in place, firing `Updated`.
    ///
    /// Returns `Ok(false)` when the record no longer exists.
    pub fn update(&self, id: EntityId, mutator: impl FnOnce(&mut E)) -> StoreResult<bool> {
        self.factory.with_write(|usage| {
            let Some(mut entity) = usage.get::<E>(id)? else {
                return Ok(false);
            };
            mutator(&mut entity);
            usage.put_with_event(&entity, ChangeKind::Updated)?;
            Ok(true)
        })
    }

    /// Fetch one record by primary key, pending-delete records included.
    pub fn get(&self, id: EntityId) -> StoreResult<Option<E>> {
        self.factory.read().get(id)
    }

    /// All active records.
    pub fn all(&self) -> StoreResult<Vec<E>> {
        self.factory.read().query(|e: &E| !e.is_deleted())
    }

    /// All records, pending-delete included (deleted-item UI).
    pub fn all_including_pending(&self) -> StoreResult<Vec<E>> {
        self.factory.read().all()
    }

    /// Active records matching a predicate.
    pub fn query(&self, predicate: impl Fn(&E) -> bool) -> StoreResult<Vec<E>> {
        self.factory
            .read()
            .query(|e: &E| !e.is_deleted() && predicate(e))
    }

    /// All records matching a predicate, pending-delete included.
    pub fn query_including_pending(&self, predicate: impl Fn(&E) -> bool) -> StoreResult<Vec<E>> {
        self.factory.read().query(predicate)
    }

    /// Purge records whose pending-delete transition is older than the
    /// configured retention window.
    ///
    /// Safe to call repeatedly and concurrently with reads; a second call
    /// with nothing left to purge is a no-op. Purging fires no event — the
    /// `Removed` event fired at soft-delete time.
    pub fn cleanup(&self) -> StoreResult<usize> {
        let cutoff = Utc::now() - self.factory.retention();
        let mut usage = self.factory.write();

        let expired: Vec<EntityId> = usage
            .all::<E>()?
            .into_iter()
            .filter(|e| matches!(e.delete_state().pending_since(), Some(since) if since <= cutoff))
            .map(|e| e.id())
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        for id in &expired {
            usage.remove_raw::<E>(*id)?;
        }
        usage.commit()?;
        info!(kind = %E::KIND, purged = expired.len(), "cleanup purged expired records");
        Ok(expired.len())
    }

    /// Purge one pending-delete record immediately, ignoring retention.
    ///
    /// Returns `Ok(false)` when the record is missing.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidOperation`] if the record is still active;
    /// purge is only reachable from the pending-delete state.
    pub fn purge(&self, id: EntityId) -> StoreResult<bool> {
        self.factory.with_write(|usage| {
            let Some(entity) = usage.get::<E>(id)? else {
                return Ok(false);
            };
            if !entity.is_deleted() {
                return Err(StoreError::InvalidOperation(format!(
                    "{} record {id} is active; purge requires a pending-delete record",
                    E::KIND
                )));
            }
            usage.remove_raw::<E>(id)?;
            Ok(true)
        })
    }

    /// Subscribe to change events for this collection.
    ///
    /// Listeners run synchronously after the causing write usage commits
    /// and releases the write lock, so they may open their own usages.
    /// They receive identity captures, never records: resolve in your own
    /// context.
    pub fn subscribe(&self, listener: impl Fn(StoreEvent<E>) + Send + Sync + 'static) {
        let shared = self.factory.shared().clone();
        self.factory.subscribe_raw(
            E::KIND,
            Arc::new(move |change, id| {
                let live = Live::new(id, shared.clone());
                listener(match change {
                    ChangeKind::Added => StoreEvent::Added(live),
                    ChangeKind::Removed => StoreEvent::Removed(live),
                    ChangeKind::Updated => StoreEvent::Updated(live),
                });
            }),
        );
    }
}
