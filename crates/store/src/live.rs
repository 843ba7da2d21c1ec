//! Live references: identity captures that cross thread boundaries
//!
//! A catalog view is bound to the usage that produced it; handing a
//! resolved record to another thread would let that thread observe a
//! stale or torn view. A [`Live`] therefore captures only the record's
//! identity (primary key + kind + owning factory) and defers all view
//! binding to the moment of use: [`Live::get`] re-attaches through a fresh
//! read usage on the calling thread, which is the only point where
//! consistency can be guaranteed.
//!
//! Capture stays valid even after the originating usage is long gone;
//! resolution simply yields `None` once the record has been purged.

use crate::factory::{ContextFactory, FactoryShared};
use crate::usage::ChangeKind;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use tempo_core::{Entity, EntityId, StoreResult};

/// Identity capture of one persisted record
///
/// Cheap to clone and safe to send anywhere; equality and hashing use the
/// captured primary key.
pub struct Live<E: Entity> {
    id: EntityId,
    shared: Arc<FactoryShared>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Live<E> {
    pub(crate) fn new(id: EntityId, shared: Arc<FactoryShared>) -> Self {
        Self {
            id,
            shared,
            _entity: PhantomData,
        }
    }

    /// The captured primary key
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The factory this reference belongs to
    pub fn factory(&self) -> ContextFactory {
        ContextFactory::from_shared(self.shared.clone())
    }

    /// Resolve into a live record bound to the calling thread's view.
    ///
    /// Returns `Ok(None)` when the record no longer exists; absence is a
    /// normal outcome, not an error.
    pub fn get(&self) -> StoreResult<Option<E>> {
        self.factory().read().get(self.id)
    }

    /// Mutate the referenced record from the calling thread.
    ///
    /// Acquires a write usage, resolves inside it, applies `mutator`,
    /// commits, and reports the change as `Updated`. Returns `Ok(false)`
    /// when the record no longer exists.
    pub fn perform_write(&self, mutator: impl FnOnce(&mut E)) -> StoreResult<bool> {
        let factory = self.factory();
        let mut usage = factory.write();
        let Some(mut entity) = usage.get::<E>(self.id)? else {
            return Ok(false);
        };
        mutator(&mut entity);
        usage.put_with_event(&entity, ChangeKind::Updated)?;
        usage.commit()?;
        Ok(true)
    }
}

impl<E: Entity> Clone for Live<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            shared: self.shared.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> PartialEq for Live<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E: Entity> Eq for Live<E> {}

impl<E: Entity> Hash for Live<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<E: Entity> fmt::Debug for Live<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Live<{}>({})", E::KIND, self.id)
    }
}

#[cfg(test)]
mod tests {
    // Live references exist to cross thread boundaries.
    static_assertions::assert_impl_all!(
        super::Live<tempo_core::ScoreRecord>: Send, Sync, Clone
    );

    use crate::config::StoreConfig;
    use crate::factory::ContextFactory;
    use tempo_core::{EntityId, ScoreRecord};

    fn persisted_score(factory: &ContextFactory) -> ScoreRecord {
        let score = ScoreRecord::new(EntityId::new(), EntityId::new(), "player");
        factory.with_write(|usage| usage.put(&score)).unwrap();
        score
    }

    #[test]
    fn wrap_then_get_returns_equal_record() {
        let factory = ContextFactory::open(StoreConfig::ephemeral()).unwrap();
        let score = persisted_score(&factory);

        let live = factory.wrap(&score).unwrap();
        let resolved = live.get().unwrap().unwrap();
        assert_eq!(resolved, score);
    }

    #[test]
    fn get_after_purge_is_none() {
        let factory = ContextFactory::open(StoreConfig::ephemeral()).unwrap();
        let score = persisted_score(&factory);
        let live = factory.wrap(&score).unwrap();

        factory
            .with_write(|usage| usage.remove_raw::<ScoreRecord>(score.id()).map(|_| ()))
            .unwrap();

        assert!(live.get().unwrap().is_none());
    }

    #[test]
    fn perform_write_mutates_and_commits() {
        let factory = ContextFactory::open(StoreConfig::ephemeral()).unwrap();
        let score = persisted_score(&factory);
        let live = factory.wrap(&score).unwrap();

        assert!(live.perform_write(|s| s.total_score = 1_000_000).unwrap());

        let resolved = live.get().unwrap().unwrap();
        assert_eq!(resolved.total_score, 1_000_000);
    }

    #[test]
    fn perform_write_on_missing_record_is_false() {
        let factory = ContextFactory::open(StoreConfig::ephemeral()).unwrap();
        let score = persisted_score(&factory);
        let live = factory.wrap(&score).unwrap();

        factory
            .with_write(|usage| usage.remove_raw::<ScoreRecord>(score.id()).map(|_| ()))
            .unwrap();

        assert!(!live.perform_write(|s| s.total_score = 1).unwrap());
    }

    #[test]
    fn equality_is_by_captured_id() {
        let factory = ContextFactory::open(StoreConfig::ephemeral()).unwrap();
        let score = persisted_score(&factory);

        let a = factory.wrap(&score).unwrap();
        let b = factory.wrap(&score).unwrap();
        assert_eq!(a, b);

        let other = persisted_score(&factory);
        assert_ne!(a, factory.wrap(&other).unwrap());
    }

    #[test]
    fn resolves_from_another_thread() {
        let factory = ContextFactory::open(StoreConfig::ephemeral()).unwrap();
        let score = persisted_score(&factory);
        let live = factory.wrap(&score).unwrap();

        let handle = std::thread::spawn(move || live.get().unwrap().unwrap());
        let resolved = handle.join().unwrap();
        assert_eq!(resolved.id, score.id);
    }
}
