//! Encrypted file-backed record store.
//!
//! The file is an append-only log of sealed transactions behind a fixed
//! header (see the `frame` module for the layout). Opening replays every
//! frame into memory, then optionally compacts. Any damage found while
//! opening is reported as an error; nothing on disk is repaired or removed.

use super::cipher::FrameCipher;
use super::frame::{Frame, StoreHeader, HEADER_SIZE};
use super::table::RecordTable;
use super::{Mutation, RecordStore, StoreConfig, StoreError};
use crate::model::{Record, RecordKind};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Size and nonce bookkeeping, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Bytes on disk, header included
    pub file_size: u64,
    /// Serialized size of the live records
    pub live_data_size: u64,
    pub records: usize,
    /// Nonce the next commit will use
    pub next_nonce: u64,
}

/// Record store persisted to a single encrypted file.
pub struct FileRecordStore {
    name: String,
    path: PathBuf,
    kinds: Vec<RecordKind>,
    cipher: FrameCipher,
    file: File,
    file_size: u64,
    next_nonce: u64,
    table: RecordTable,
    /// Set when a failed append could not be truncated away
    poisoned: bool,
    /// Cut the next append after this many bytes, then fail it
    #[cfg(test)]
    tear_next_append: Option<usize>,
}

impl FileRecordStore {
    /// Open or create the store at `config.path`.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let StoreConfig {
            name,
            path,
            encryption_key,
            schema_version,
            kinds,
            should_compact,
        } = config;
        let cipher = FrameCipher::new(&encryption_key);

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let (table, next_nonce) = if bytes.is_empty() {
            let header = StoreHeader::new(schema_version, cipher.key_check(), 0);
            file.write_all(&header.to_bytes())?;
            file.sync_data()?;
            bytes = header.to_bytes();
            (RecordTable::new(), 0)
        } else {
            replay(&bytes, &cipher, schema_version, &name, &kinds)?
        };
        let file_size = bytes.len() as u64;
        drop(bytes);

        let live_data_size = live_size(&table)?;
        let compacting = should_compact.is_some_and(|decide| decide(file_size, live_data_size));

        info!(
            store = %name,
            path = %path.display(),
            file_size,
            data_size = live_data_size,
            records = table.len(),
            compacting,
            "opening store"
        );

        let mut store = FileRecordStore {
            name,
            path,
            kinds,
            cipher,
            file,
            file_size,
            next_nonce,
            table,
            poisoned: false,
            #[cfg(test)]
            tear_next_append: None,
        };
        if compacting {
            store.compact(schema_version)?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.table.iter()
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            file_size: self.file_size,
            live_data_size: live_size(&self.table)?,
            records: self.table.len(),
            next_nonce: self.next_nonce,
        })
    }

    fn append(&mut self, encoded: &[u8]) -> Result<(), StoreError> {
        #[cfg(test)]
        {
            if let Some(keep) = self.tear_next_append.take() {
                self.file.write_all(&encoded[..keep.min(encoded.len())])?;
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "torn append",
                )));
            }
        }
        self.file.write_all(encoded)?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Cut the file back to the last committed frame. If that fails the
    /// store stops accepting writes.
    fn discard_partial_frame(&mut self) {
        match self
            .file
            .set_len(self.file_size)
            .and_then(|()| self.file.sync_data())
        {
            Ok(()) => {
                warn!(store = %self.name, file_size = self.file_size, "discarded partial frame after failed append");
            }
            Err(e) => {
                self.poisoned = true;
                error!(store = %self.name, error = %e, "cannot discard partial frame, refusing further writes");
            }
        }
    }

    /// Rewrite the file with one frame per live record, then swap it in.
    fn compact(&mut self, schema_version: u64) -> Result<(), StoreError> {
        let tmp_path = compacting_path(&self.path);
        let before = self.file_size;

        match self.write_compacted(&tmp_path, schema_version) {
            Ok((file_size, next_nonce)) => {
                fs::rename(&tmp_path, &self.path)?;
                self.file = OpenOptions::new().read(true).append(true).open(&self.path)?;
                self.file_size = file_size;
                self.next_nonce = next_nonce;
                info!(
                    store = %self.name,
                    before,
                    after = file_size,
                    "compacted store"
                );
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&tmp_path) {
                    warn!(path = %tmp_path.display(), error = %cleanup, "failed to remove partial compaction file");
                }
                Err(e)
            }
        }
    }

    fn write_compacted(&self, tmp_path: &Path, schema_version: u64) -> Result<(u64, u64), StoreError> {
        let mut out = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(tmp_path)?;

        // Nonces continue past the old file so none is reused under this key.
        let mut nonce = self.next_nonce;
        let header = StoreHeader::new(schema_version, self.cipher.key_check(), nonce);
        out.write_all(&header.to_bytes())?;
        let mut size = HEADER_SIZE as u64;

        for record in self.table.iter() {
            let frame = seal(&self.cipher, nonce, &[Mutation::Put(record.clone())])?;
            let encoded = frame.encode();
            out.write_all(&encoded)?;
            size += encoded.len() as u64;
            nonce += 1;
        }
        out.sync_all()?;
        debug!(path = %tmp_path.display(), size, frames = nonce - self.next_nonce, "wrote compacted file");
        Ok((size, nonce))
    }
}

impl RecordStore for FileRecordStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn permitted_kinds(&self) -> &[RecordKind] {
        &self.kinds
    }

    fn objects(&self, kind: RecordKind) -> Vec<&Record> {
        self.table.objects(kind)
    }

    fn get(&self, id: &str) -> Option<&Record> {
        self.table.get(id)
    }

    fn len(&self) -> usize {
        self.table.len()
    }

    /// Append one frame and sync it before the batch becomes visible. A
    /// failed append is truncated away and its nonce stays spent.
    fn apply(&mut self, batch: Vec<Mutation>) -> Result<(), StoreError> {
        if self.poisoned {
            return Err(StoreError::Poisoned {
                store: self.name.clone(),
            });
        }
        self.table.check(&batch, &self.name, &self.kinds)?;

        let nonce = self.next_nonce;
        let frame = seal(&self.cipher, nonce, &batch)?;
        let encoded = frame.encode();
        self.next_nonce += 1;
        if let Err(e) = self.append(&encoded) {
            self.discard_partial_frame();
            return Err(e);
        }

        self.file_size += encoded.len() as u64;
        self.table.apply(batch);
        Ok(())
    }
}

impl std::fmt::Debug for FileRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecordStore")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("records", &self.table.len())
            .field("file_size", &self.file_size)
            .field("next_nonce", &self.next_nonce)
            .finish()
    }
}

fn seal(cipher: &FrameCipher, nonce: u64, batch: &[Mutation]) -> Result<Frame, StoreError> {
    let plaintext = bincode::serialize(batch)?;
    let (ciphertext, tag) = cipher.seal(nonce, &plaintext)?;
    Ok(Frame {
        nonce,
        tag,
        ciphertext,
    })
}

/// Rebuild the table from a whole file. Returns it with the next nonce.
fn replay(
    bytes: &[u8],
    cipher: &FrameCipher,
    schema_version: u64,
    name: &str,
    kinds: &[RecordKind],
) -> Result<(RecordTable, u64), StoreError> {
    let header = StoreHeader::from_bytes(bytes)?;
    if header.schema_version != schema_version {
        return Err(StoreError::SchemaMismatch {
            on_disk: header.schema_version,
            requested: schema_version,
        });
    }
    if header.key_check != cipher.key_check() {
        return Err(StoreError::Decryption(
            "encryption key does not match this store".to_string(),
        ));
    }

    let mut table = RecordTable::new();
    let mut next_nonce = header.nonce_floor;
    let mut offset = HEADER_SIZE;

    while offset < bytes.len() {
        let (frame, size) = Frame::decode(&bytes[offset..], offset as u64)?;
        if frame.nonce < next_nonce {
            return Err(StoreError::Corruption {
                offset: offset as u64,
                reason: format!(
                    "nonce {} reused, expected at least {}",
                    frame.nonce, next_nonce
                ),
            });
        }
        let plaintext = cipher.open(frame.nonce, &frame.ciphertext, &frame.tag)?;
        let batch: Vec<Mutation> = bincode::deserialize(&plaintext)?;
        table.check(&batch, name, kinds)?;
        table.apply(batch);

        next_nonce = frame.nonce + 1;
        offset += size;
    }

    debug_assert_eq!(offset, bytes.len(), "Postcondition: replay consumed the file");
    Ok((table, next_nonce))
}

fn live_size(table: &RecordTable) -> Result<u64, StoreError> {
    table
        .iter()
        .try_fold(0u64, |total, record| -> Result<u64, StoreError> {
            Ok(total + bincode::serialized_size(record)?)
        })
}

fn compacting_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".compacting");
    PathBuf::from(name)
}
