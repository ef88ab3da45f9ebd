//! Store Lifecycle
//!
//! Owns the data directory and the pair of file stores living in it:
//! wipe, backup, restore, and opening with optional compaction.
//!
//! A store path may be opened with compaction only if this manager has not
//! opened it before, in any mode. The opened set is per manager instance,
//! so "restart the process" maps to "build a new manager".

mod paths;

pub use paths::{
    StorePaths, LARGE_BACKUP_FILE, LARGE_STORE_FILE, SMALL_BACKUP_FILE, SMALL_STORE_FILE,
};

use crate::error::{Error, PolicyViolation, Result};
use crate::simulator::{DeterministicRng, KEY_STREAM};
use crate::store::{EncryptionKey, FileRecordStore, StoreConfig, ENCRYPTION_KEY_LEN};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Schema version both stores are opened with
pub const SCHEMA_VERSION: u64 = 1;
/// Seed of the key derivation stream
pub const KEY_SEED: u64 = 0;

/// Derive the shared 64-byte store key. Each byte is in `[0, 255)`.
pub fn derive_encryption_key(seed: u64) -> EncryptionKey {
    let mut rng = DeterministicRng::with_stream(seed, KEY_STREAM);
    let mut bytes = [0u8; ENCRYPTION_KEY_LEN];
    for b in bytes.iter_mut() {
        *b = rng.gen_below(255) as u8;
    }
    EncryptionKey::new(bytes)
}

#[derive(Debug)]
pub struct StoreLifecycle {
    paths: StorePaths,
    encryption_key: EncryptionKey,
    opened: HashSet<PathBuf>,
}

impl StoreLifecycle {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        StoreLifecycle {
            paths: StorePaths::in_dir(data_dir),
            encryption_key: derive_encryption_key(KEY_SEED),
            opened: HashSet::new(),
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Delete both primaries and both backups. Missing files are fine,
    /// other failures are logged and skipped.
    pub fn wipe(&self) {
        info!(dir = %self.paths.dir.display(), "wiping stores");
        for path in self.paths.primaries().into_iter().chain(self.paths.backups()) {
            remove_if_present(path);
        }
    }

    /// Replace the backups with copies of the primaries.
    pub fn backup(&self) -> Result<()> {
        for (primary, backup) in self.paths.pairs() {
            remove_if_present(backup);
            copy(primary, backup)?;
        }
        info!(dir = %self.paths.dir.display(), "backed up stores");
        Ok(())
    }

    /// Replace the primaries with copies of the backups.
    pub fn restore(&self) -> Result<()> {
        for (primary, backup) in self.paths.pairs() {
            remove_if_present(primary);
            copy(backup, primary)?;
        }
        info!(dir = %self.paths.dir.display(), "restored stores from backup");
        Ok(())
    }

    pub fn databases_exist(&self) -> bool {
        self.paths.small.exists()
    }

    /// True while neither store has been opened by this manager.
    pub fn compacting_possible(&self) -> bool {
        !self.opened.contains(&self.paths.small) && !self.opened.contains(&self.paths.large)
    }

    /// Open `(small, large)`. With `compact_on_open`, each store compacts
    /// during this open only.
    pub fn open_stores(&mut self, compact_on_open: bool) -> Result<(FileRecordStore, FileRecordStore)> {
        fs::create_dir_all(&self.paths.dir)
            .map_err(|e| Error::filesystem("create", &self.paths.dir, e))?;

        let small = StoreConfig::small(&self.paths.small, self.encryption_key.clone());
        let small = self.open_store(small, compact_on_open)?;
        let large = StoreConfig::large(&self.paths.large, self.encryption_key.clone());
        let large = self.open_store(large, compact_on_open)?;
        Ok((small, large))
    }

    fn open_store(&mut self, config: StoreConfig, compact_on_open: bool) -> Result<FileRecordStore> {
        // Recorded before the engine open, so a failed open still counts.
        let first_open = self.opened.insert(config.path.clone());
        if compact_on_open && !first_open {
            return Err(PolicyViolation::CompactionAlreadyPerformed { path: config.path }.into());
        }

        let config = config
            .with_schema_version(SCHEMA_VERSION)
            .compact_when(move |_file_size, _data_size| compact_on_open);
        Ok(FileRecordStore::open(config)?)
    }
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove store file"),
    }
}

fn copy(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map_err(|e| Error::filesystem("copy", from, e))?;
    Ok(())
}
