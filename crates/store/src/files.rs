//! Content-addressed file bookkeeping over the shared factory

use crate::factory::ContextFactory;
use crate::live::Live;
use crate::usage::ChangeKind;
use tempo_core::{FileRecord, StoreResult};
use tracing::info;

/// Store tracking which on-disk blobs are still referenced by models.
///
/// Blobs are addressed by content hash; importing the same content twice
/// bumps the existing record's reference count instead of duplicating it.
/// [`FileStore::cleanup`] erases records nothing references any more — the
/// client runs it at startup, before any importer gets a chance to add
/// new references.
pub struct FileStore {
    factory: ContextFactory,
}

impl FileStore {
    /// Create a file store against an explicit factory.
    pub fn new(factory: ContextFactory) -> Self {
        Self { factory }
    }

    /// Record one more reference to the blob with this content hash,
    /// inserting the record on first reference.
    pub fn reference(&self, hash: &str, size: u64) -> StoreResult<Live<FileRecord>> {
        let record = self.factory.with_write(|usage| {
            let existing = usage
                .query(|f: &FileRecord| f.hash == hash)?
                .into_iter()
                .next();

            match existing {
                Some(mut record) => {
                    record.reference_count += 1;
                    usage.put_with_event(&record, ChangeKind::Updated)?;
                    Ok(record)
                }
                None => {
                    let record = FileRecord::new(hash, size);
                    usage.put_with_event(&record, ChangeKind::Added)?;
                    Ok(record)
                }
            }
        })?;
        self.factory.wrap(&record)
    }

    /// Drop one reference to the blob with this content hash.
    ///
    /// Returns `Ok(false)` when no record exists for the hash. The record
    /// itself stays behind at zero references until [`FileStore::cleanup`].
    pub fn dereference(&self, hash: &str) -> StoreResult<bool> {
        self.factory.with_write(|usage| {
            let Some(mut record) = usage
                .query(|f: &FileRecord| f.hash == hash)?
                .into_iter()
                .next()
            else {
                return Ok(false);
            };
            record.reference_count = record.reference_count.saturating_sub(1);
            usage.put_with_event(&record, ChangeKind::Updated)?;
            Ok(true)
        })
    }

    /// Fetch the record for a content hash.
    pub fn get_by_hash(&self, hash: &str) -> StoreResult<Option<FileRecord>> {
        Ok(self
            .factory
            .read()
            .query(|f: &FileRecord| f.hash == hash)?
            .into_iter()
            .next())
    }

    /// Erase every record whose reference count has dropped to zero.
    ///
    /// Safe to call repeatedly; a second pass with nothing unreferenced is
    /// a no-op.
    pub fn cleanup(&self) -> StoreResult<usize> {
        let mut usage = self.factory.write();
        let orphaned: Vec<_> = usage
            .query(|f: &FileRecord| f.reference_count == 0)?
            .into_iter()
            .map(|f| f.id)
            .collect();

        if orphaned.is_empty() {
            return Ok(0);
        }

        for id in &orphaned {
            usage.remove_raw::<FileRecord>(*id)?;
        }
        usage.commit()?;
        info!(purged = orphaned.len(), "file cleanup erased unreferenced records");
        Ok(orphaned.len())
    }
}
