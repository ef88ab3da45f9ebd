use crate::model::ModelError;
use crate::store::StoreError;
use crate::workload::ConfigError;
use std::path::PathBuf;

/// Store-open rules enforced by the lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    /// A compacting open was requested for a path already opened by this manager
    CompactionAlreadyPerformed { path: PathBuf },
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyViolation::CompactionAlreadyPerformed { path } => write!(
                f,
                "Must force-quit and restart the app to compact the database ({})",
                path.display()
            ),
        }
    }
}

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    Policy(PolicyViolation),
    /// Backup or restore copy failure
    Filesystem {
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    Store(StoreError),
    Model(ModelError),
    Config(ConfigError),
}

impl Error {
    pub(crate) fn filesystem(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Policy(v) => write!(f, "{}", v),
            Error::Filesystem { op, path, source } => {
                write!(f, "Failed to {} {}: {}", op, path.display(), source)
            }
            Error::Store(e) => write!(f, "{}", e),
            Error::Model(e) => write!(f, "Model error: {}", e),
            Error::Config(e) => write!(f, "Invalid scenario: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Policy(_) => None,
            Error::Filesystem { source, .. } => Some(source),
            Error::Store(e) => Some(e),
            Error::Model(e) => Some(e),
            Error::Config(e) => Some(e),
        }
    }
}

impl From<PolicyViolation> for Error {
    fn from(v: PolicyViolation) -> Self {
        Error::Policy(v)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

impl From<ModelError> for Error {
    fn from(e: ModelError) -> Self {
        Error::Model(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_message() {
        let err: Error = PolicyViolation::CompactionAlreadyPerformed {
            path: PathBuf::from("data/small.store"),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.starts_with("Must force-quit and restart the app to compact the database"));
        assert!(msg.contains("small.store"));
    }

    #[test]
    fn test_filesystem_source() {
        use std::error::Error as _;
        let err = Error::filesystem(
            "copy",
            "a.store",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("copy a.store"));
    }
}
