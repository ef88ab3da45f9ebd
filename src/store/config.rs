use super::EncryptionKey;
use crate::model::RecordKind;
use std::path::{Path, PathBuf};

/// Called once after replay with `(file_size, live_data_size)` in bytes.
/// Returning true rewrites the file with only live records.
pub type CompactionDecision = Box<dyn FnOnce(u64, u64) -> bool>;

/// Default schema version for new stores
pub const DEFAULT_SCHEMA_VERSION: u64 = 1;

/// Everything needed to open a [`FileRecordStore`](super::FileRecordStore)
pub struct StoreConfig {
    pub name: String,
    pub path: PathBuf,
    pub encryption_key: EncryptionKey,
    pub schema_version: u64,
    pub kinds: Vec<RecordKind>,
    pub should_compact: Option<CompactionDecision>,
}

impl StoreConfig {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        encryption_key: EncryptionKey,
        kinds: &[RecordKind],
    ) -> Self {
        StoreConfig {
            name: name.into(),
            path: path.into(),
            encryption_key,
            schema_version: DEFAULT_SCHEMA_VERSION,
            kinds: kinds.to_vec(),
            should_compact: None,
        }
    }

    /// Config for the small store (SmallThing1, SmallThing2)
    pub fn small(path: impl AsRef<Path>, encryption_key: EncryptionKey) -> Self {
        Self::new(
            "small",
            path.as_ref(),
            encryption_key,
            &RecordKind::SMALL_STORE,
        )
    }

    /// Config for the large store (SmallThing1, MediumThing, LargeThing, HugeThing)
    pub fn large(path: impl AsRef<Path>, encryption_key: EncryptionKey) -> Self {
        Self::new(
            "large",
            path.as_ref(),
            encryption_key,
            &RecordKind::LARGE_STORE,
        )
    }

    pub fn with_schema_version(mut self, schema_version: u64) -> Self {
        self.schema_version = schema_version;
        self
    }

    pub fn compact_when<F>(mut self, decide: F) -> Self
    where
        F: FnOnce(u64, u64) -> bool + 'static,
    {
        self.should_compact = Some(Box::new(decide));
        self
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("encryption_key", &self.encryption_key)
            .field("schema_version", &self.schema_version)
            .field("kinds", &self.kinds)
            .field("should_compact", &self.should_compact.is_some())
            .finish()
    }
}
