use std::path::{Path, PathBuf};

pub const SMALL_STORE_FILE: &str = "small.store";
pub const LARGE_STORE_FILE: &str = "large.store";
pub const SMALL_BACKUP_FILE: &str = "small-backup.store";
pub const LARGE_BACKUP_FILE: &str = "large-backup.store";

/// The four fixed store files inside one data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub dir: PathBuf,
    pub small: PathBuf,
    pub large: PathBuf,
    pub small_backup: PathBuf,
    pub large_backup: PathBuf,
}

impl StorePaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        StorePaths {
            dir: dir.to_path_buf(),
            small: dir.join(SMALL_STORE_FILE),
            large: dir.join(LARGE_STORE_FILE),
            small_backup: dir.join(SMALL_BACKUP_FILE),
            large_backup: dir.join(LARGE_BACKUP_FILE),
        }
    }

    pub fn primaries(&self) -> [&Path; 2] {
        [self.small.as_path(), self.large.as_path()]
    }

    pub fn backups(&self) -> [&Path; 2] {
        [self.small_backup.as_path(), self.large_backup.as_path()]
    }

    /// (primary, backup) pairs
    pub fn pairs(&self) -> [(&Path, &Path); 2] {
        [
            (self.small.as_path(), self.small_backup.as_path()),
            (self.large.as_path(), self.large_backup.as_path()),
        ]
    }
}
