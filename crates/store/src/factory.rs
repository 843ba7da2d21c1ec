//! Context factory: exclusive owner of the catalog and its lifecycle
//!
//! The factory arbitrates all access to the shared catalog:
//!
//! - [`ContextFactory::read`] hands out any number of concurrent read
//!   usages, each wrapping an immutable snapshot. Never blocks.
//! - [`ContextFactory::write`] hands out the single write usage, blocking
//!   the caller until the current holder's scope ends. There is no
//!   built-in timeout; callers needing bounded waiting wrap the call with
//!   their own cancellation.
//! - [`ContextFactory::wrap`] captures a persisted record's identity as a
//!   [`Live`] handle for cross-thread use.
//!
//! The factory is the only component that touches the snapshot file; no
//! other code may open it. A corrupted or unreadable file is fatal at
//! [`ContextFactory::open`] and is reported, not retried.
//!
//! # Commit sequence
//!
//! ```text
//! 1. write() - acquire the global write lock, clone the catalog
//! 2. put()/remove - buffer mutations in the working copy
//! 3. commit():
//!    a. rewrite the snapshot file (durability point)
//!    b. swap the published snapshot (visibility point)
//!    c. release the write lock
//!    d. dispatch buffered change events
//! ```
//!
//! A failure before (a) completes leaves both the file and the published
//! snapshot untouched; dropping the usage without commit discards the
//! working copy and releases the lock.

use crate::config::StoreConfig;
use crate::live::Live;
use crate::persist::SnapshotFile;
use crate::snapshot::{Catalog, RecordKey, Snapshot};
use crate::usage::{ChangeKind, ReadUsage, WriteUsage};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempo_core::{Entity, EntityId, EntityKind, StoreError, StoreResult};
use tracing::{debug, info, warn};

/// Owned guard on the global write lock, carried inside a write usage.
pub(crate) type WriteGuard = parking_lot::lock_api::ArcMutexGuard<parking_lot::RawMutex, ()>;

/// Type-erased change listener registered for one record kind.
pub(crate) type Listener = Arc<dyn Fn(ChangeKind, EntityId) + Send + Sync>;

/// The published catalog state: commit version + data, swapped atomically.
pub(crate) struct Published {
    pub(crate) version: u64,
    pub(crate) data: Arc<Catalog>,
}

/// State shared between the factory, its usages and live references.
pub(crate) struct FactoryShared {
    pub(crate) config: StoreConfig,
    /// Currently published snapshot. Readers clone the Arc; the committing
    /// writer swaps it.
    pub(crate) live: RwLock<Published>,
    /// Context generation; bumped when a schema migration invalidates
    /// outstanding usages.
    pub(crate) generation: AtomicU64,
    /// The single global write lock.
    pub(crate) write_lock: Arc<Mutex<()>>,
    /// Snapshot file when disk-backed. Behind a mutex because migration
    /// swaps the location.
    pub(crate) file: Mutex<Option<SnapshotFile>>,
    /// Change listeners keyed by record kind.
    pub(crate) listeners: DashMap<EntityKind, Vec<Listener>>,
}

impl FactoryShared {
    /// Invoke every listener registered for `kind`.
    ///
    /// The listener list is cloned out of the map first so a listener can
    /// register further listeners without deadlocking.
    pub(crate) fn dispatch(&self, kind: EntityKind, change: ChangeKind, id: EntityId) {
        let hooks: Vec<Listener> = match self.listeners.get(&kind) {
            Some(hooks) => hooks.clone(),
            None => return,
        };
        for hook in hooks {
            hook(change, id);
        }
    }
}

/// Handle on the shared store; cheap to clone, safe to share across threads
#[derive(Clone)]
pub struct ContextFactory {
    shared: Arc<FactoryShared>,
}

impl ContextFactory {
    /// Open a store from the given configuration.
    ///
    /// Disk-backed stores load the snapshot file: a missing file is a
    /// normal first open; a corrupted one is fatal. A file persisted at an
    /// older schema version is migrated forward (rewritten at the current
    /// version) and the context generation is bumped.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Corruption`] if the snapshot file fails validation
    /// - [`StoreError::Io`] if the file cannot be read or rewritten
    /// - [`StoreError::InvalidOperation`] if the file was written by a
    ///   newer schema than this build understands
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let mut version = 0u64;
        let mut catalog = Catalog::new();
        let mut needs_migration = false;

        let file = match &config.dir {
            Some(dir) => {
                let file = SnapshotFile::new(dir);
                if let Some(loaded) = file.load()? {
                    if loaded.schema_version > config.schema_version {
                        return Err(StoreError::InvalidOperation(format!(
                            "snapshot file carries schema version {} but this build expects {}",
                            loaded.schema_version, config.schema_version
                        )));
                    }
                    needs_migration = loaded.schema_version < config.schema_version;
                    version = loaded.version;
                    catalog = loaded.records;
                }
                Some(file)
            }
            None => None,
        };

        let schema_version = config.schema_version;
        let factory = Self {
            shared: Arc::new(FactoryShared {
                config,
                live: RwLock::new(Published {
                    version,
                    data: Arc::new(catalog),
                }),
                generation: AtomicU64::new(0),
                write_lock: Arc::new(Mutex::new(())),
                file: Mutex::new(file),
                listeners: DashMap::new(),
            }),
        };

        if needs_migration {
            {
                let published = factory.shared.live.read();
                if let Some(file) = factory.shared.file.lock().as_ref() {
                    file.write(schema_version, published.version, &published.data)?;
                }
            }
            factory.invalidate_contexts();
            info!(schema = schema_version, "schema migrated; contexts invalidated");
        }

        info!(
            records = factory.shared.live.read().data.len(),
            version,
            ephemeral = factory.shared.file.lock().is_none(),
            "store opened"
        );
        Ok(factory)
    }

    pub(crate) fn from_shared(shared: Arc<FactoryShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<FactoryShared> {
        &self.shared
    }

    /// Take an immutable snapshot of the current published state.
    pub fn snapshot(&self) -> Snapshot {
        let published = self.shared.live.read();
        Snapshot::new(
            published.version,
            self.shared.generation.load(Ordering::SeqCst),
            published.data.clone(),
        )
    }

    /// Acquire a read usage. Never blocks; any number may be outstanding.
    pub fn read(&self) -> ReadUsage {
        ReadUsage::new(self.snapshot(), self.shared.clone())
    }

    /// Acquire the write usage, blocking until the global write lock is
    /// free. Mutations buffer in a working copy until
    /// [`WriteUsage::commit`]; dropping the usage without committing
    /// discards them.
    pub fn write(&self) -> WriteUsage {
        let guard = self.shared.write_lock.lock_arc();
        debug!("write usage acquired");
        let (base_version, working) = {
            let published = self.shared.live.read();
            (published.version, (*published.data).clone())
        };
        let generation = self.shared.generation.load(Ordering::SeqCst);
        WriteUsage::new(guard, self.shared.clone(), working, base_version, generation)
    }

    /// Run `f` inside a write usage, committing on success.
    ///
    /// On error the usage is dropped without commit, discarding every
    /// buffered mutation.
    pub fn with_write<T>(
        &self,
        f: impl FnOnce(&mut WriteUsage) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut usage = self.write();
        let out = f(&mut usage)?;
        usage.commit()?;
        Ok(out)
    }

    /// Capture a persisted record's identity as a [`Live`] handle.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotPersisted`] if the record has never been committed.
    pub fn wrap<E: Entity>(&self, entity: &E) -> StoreResult<Live<E>> {
        let key = RecordKey::of::<E>(entity.id());
        if !self.shared.live.read().data.contains_key(&key) {
            return Err(StoreError::NotPersisted {
                kind: E::KIND,
                id: entity.id(),
            });
        }
        Ok(Live::new(entity.id(), self.shared.clone()))
    }

    /// Invalidate every outstanding usage and live resolution.
    ///
    /// Called when a schema migration advances the on-disk layout. Usages
    /// acquired before the call fail their next operation with
    /// [`StoreError::Stale`]; fresh usages see the new generation.
    pub fn invalidate_contexts(&self) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, "contexts invalidated");
    }

    /// Relocate the snapshot file to `new_dir`.
    ///
    /// Blocks writers while the current state is flushed at the new
    /// location, then retires the old file (best effort). An ephemeral
    /// store becomes disk-backed.
    pub fn migrate(&self, new_dir: &Path) -> StoreResult<()> {
        let _guard = self.shared.write_lock.lock_arc();
        let (version, data) = {
            let published = self.shared.live.read();
            (published.version, published.data.clone())
        };

        let new_file = SnapshotFile::new(new_dir);
        new_file.write(self.shared.config.schema_version, version, &data)?;

        let mut slot = self.shared.file.lock();
        if let Some(old) = slot.as_ref() {
            if old.path() != new_file.path() {
                match fs::remove_file(old.path()) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(
                        path = %old.path().display(),
                        error = %e,
                        "failed to retire old snapshot file after migration"
                    ),
                }
            }
        }
        *slot = Some(new_file);
        info!(dir = %new_dir.display(), "storage migrated");
        Ok(())
    }

    /// Register a type-erased change listener for one record kind.
    pub(crate) fn subscribe_raw(&self, kind: EntityKind, listener: Listener) {
        self.shared.listeners.entry(kind).or_default().push(listener);
    }

    /// Commit version of the currently published snapshot.
    pub fn commit_version(&self) -> u64 {
        self.shared.live.read().version
    }

    /// Current context generation.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Schema version this store was opened at.
    pub fn schema_version(&self) -> u32 {
        self.shared.config.schema_version
    }

    pub(crate) fn retention(&self) -> chrono::Duration {
        self.shared.config.retention
    }
}

impl std::fmt::Debug for ContextFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextFactory")
            .field("version", &self.commit_version())
            .field("generation", &self.generation())
            .finish()
    }
}
