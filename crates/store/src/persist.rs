//! Crash-safe snapshot-file persistence
//!
//! Every commit rewrites the whole catalog to one snapshot file using the
//! write-fsync-rename pattern:
//!
//! 1. Write to a temporary file in the same directory
//! 2. fsync the temporary file
//! 3. Atomic rename over the final path
//! 4. fsync the parent directory
//!
//! # File format
//!
//! ```text
//! magic            8 bytes  "TEMPOSNP"
//! schema_version   u32 LE
//! payload_len      u64 LE
//! checksum         u64 LE   xxh3 over the payload
//! payload          bincode  commit version + catalog map
//! ```
//!
//! A missing file is a normal first open. Anything else that fails to
//! parse — bad magic, truncated header, length or checksum mismatch,
//! undecodable payload — is corruption, fatal at open and never retried:
//! no automatic repair decision can safely be made for an embedded
//! database file.

use crate::snapshot::Catalog;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempo_core::{StoreError, StoreResult};
use xxhash_rust::xxh3::xxh3_64;

const MAGIC: &[u8; 8] = b"TEMPOSNP";
const FILE_NAME: &str = "store.snapshot";
const TMP_NAME: &str = ".store.snapshot.tmp";

/// Header length: magic + schema version + payload length + checksum.
const HEADER_LEN: usize = 8 + 4 + 8 + 8;

#[derive(Serialize, Deserialize)]
struct SnapshotPayload {
    version: u64,
    records: Catalog,
}

/// Contents successfully loaded from a snapshot file
pub(crate) struct LoadedSnapshot {
    /// Schema version recorded in the header
    pub schema_version: u32,
    /// Commit version at the time the file was written
    pub version: u64,
    /// The catalog map
    pub records: Catalog,
}

/// Handle on the snapshot file inside one storage directory
#[derive(Debug, Clone)]
pub(crate) struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot file, if present.
    ///
    /// Returns `Ok(None)` when no file exists yet (first open).
    pub fn load(&self) -> StoreResult<Option<LoadedSnapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if bytes.len() < HEADER_LEN {
            return Err(StoreError::Corruption(format!(
                "snapshot file truncated: {} bytes, header needs {HEADER_LEN}",
                bytes.len()
            )));
        }

        let mut cursor = Cursor::new(&bytes);
        let mut magic = [0u8; 8];
        cursor.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(StoreError::Corruption(
                "snapshot file has unrecognized magic".to_string(),
            ));
        }

        let schema_version = cursor.read_u32::<LittleEndian>()?;
        let payload_len = cursor.read_u64::<LittleEndian>()?;
        let checksum = cursor.read_u64::<LittleEndian>()?;

        let payload = &bytes[HEADER_LEN..];
        if payload.len() as u64 != payload_len {
            return Err(StoreError::Corruption(format!(
                "snapshot payload length mismatch: header says {payload_len}, file has {}",
                payload.len()
            )));
        }
        if xxh3_64(payload) != checksum {
            return Err(StoreError::Corruption(
                "snapshot payload checksum mismatch".to_string(),
            ));
        }

        let decoded: SnapshotPayload = bincode::deserialize(payload).map_err(|e| {
            StoreError::Corruption(format!("snapshot payload failed to decode: {e}"))
        })?;

        Ok(Some(LoadedSnapshot {
            schema_version,
            version: decoded.version,
            records: decoded.records,
        }))
    }

    /// Write the catalog out, replacing any previous file atomically.
    pub fn write(&self, schema_version: u32, version: u64, records: &Catalog) -> StoreResult<()> {
        let payload = bincode::serialize(&SnapshotPayload {
            version,
            records: records.clone(),
        })?;

        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(MAGIC);
        buf.write_u32::<LittleEndian>(schema_version)?;
        buf.write_u64::<LittleEndian>(payload.len() as u64)?;
        buf.write_u64::<LittleEndian>(xxh3_64(&payload))?;
        buf.extend_from_slice(&payload);

        let dir = self.path.parent().ok_or_else(|| {
            StoreError::InvalidOperation(format!(
                "snapshot path {} has no parent directory",
                self.path.display()
            ))
        })?;
        fs::create_dir_all(dir)?;

        let tmp_path = dir.join(TMP_NAME);
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&buf)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        // Directory-entry durability; best effort on platforms where
        // directories cannot be opened as files.
        if let Ok(dir_handle) = File::open(dir) {
            let _ = dir_handle.sync_all();
        }

        Ok(())
    }
}
