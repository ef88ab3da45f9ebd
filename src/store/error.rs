use crate::model::{RecordId, RecordKind};
use std::io::Error as IoError;

/// Error type for record store operations
#[derive(Debug)]
pub enum StoreError {
    /// I/O error
    Io(IoError),
    /// Damaged file contents (bad checksum, truncated frame, bad header)
    Corruption { offset: u64, reason: String },
    /// Frame could not be sealed
    Encryption(String),
    /// Authentication failed: wrong key or tampered ciphertext
    Decryption(String),
    /// On-disk format version is not understood
    UnsupportedFormat(u8),
    /// File was written with a different schema version
    SchemaMismatch { on_disk: u64, requested: u64 },
    /// Serialization error
    Serialization(String),
    /// Record kind is not part of this store's schema
    KindNotPermitted { store: String, kind: RecordKind },
    /// Identifier already used by a record of another kind
    IdConflict {
        id: RecordId,
        existing: RecordKind,
        incoming: RecordKind,
    },
    /// Delete of an identifier that is not in the store
    NotFound(RecordId),
    /// A failed append could not be rolled back; the store refuses writes
    Poisoned { store: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "Store I/O error: {}", e),
            StoreError::Corruption { offset, reason } => {
                write!(f, "Store corruption at offset {}: {}", offset, reason)
            }
            StoreError::Encryption(msg) => write!(f, "Store encryption failed: {}", msg),
            StoreError::Decryption(msg) => write!(f, "Store decryption failed: {}", msg),
            StoreError::UnsupportedFormat(v) => write!(f, "Unsupported store format: {}", v),
            StoreError::SchemaMismatch { on_disk, requested } => write!(
                f,
                "Schema version mismatch: file has {}, opened with {} (migration required)",
                on_disk, requested
            ),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StoreError::KindNotPermitted { store, kind } => {
                write!(f, "{} is not permitted in store {}", kind, store)
            }
            StoreError::IdConflict {
                id,
                existing,
                incoming,
            } => write!(
                f,
                "Identifier {} belongs to a {}, cannot store a {}",
                id, existing, incoming
            ),
            StoreError::NotFound(id) => write!(f, "Record not found: {}", id),
            StoreError::Poisoned { store } => write!(
                f,
                "Store {} refuses writes after a failed append could not be rolled back",
                store
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for StoreError {
    fn from(e: IoError) -> Self {
        StoreError::Io(e)
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
