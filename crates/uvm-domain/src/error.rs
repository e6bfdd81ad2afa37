use std::io;
use std::path::{Path, PathBuf};

pub type Result<T, E = UvmError> = std::result::Result<T, E>;

/// Errors surfaced by path validation, the entry model, the registry and the
/// provisioner.
#[derive(Debug, thiserror::Error)]
pub enum UvmError {
    #[error("[UVM101] invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error(
        "[UVM102] environment path '{}' is outside managed root '{}'",
        .path.display(),
        .root.display()
    )]
    OutsideManagedRoot { path: PathBuf, root: PathBuf },
    #[error("[UVM110] invalid environment entry: {0}")]
    InvalidEntry(String),
    #[error("[UVM120] registry corrupted: {0}")]
    RegistryCorrupted(String),
    #[error("[UVM121] environment '{0}' already exists")]
    EntryAlreadyExists(String),
    #[error("[UVM122] environment '{0}' not found")]
    EntryNotFound(String),
    #[error("[UVM123] failed to lock registry at '{}': {source}", .path.display())]
    LockUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("[UVM130] invalid python version specifier: {0}")]
    InvalidPythonSpec(String),
    #[error("[UVM131] failed to create environment at '{}': {reason}", .path.display())]
    EnvironmentCreationFailed { path: PathBuf, reason: String },
    #[error("[UVM190] {action} '{}': {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl UvmError {
    pub fn invalid_path(path: impl AsRef<Path>, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.as_ref().display().to_string(),
            reason,
        }
    }

    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath { .. } => "UVM101",
            Self::OutsideManagedRoot { .. } => "UVM102",
            Self::InvalidEntry(_) => "UVM110",
            Self::RegistryCorrupted(_) => "UVM120",
            Self::EntryAlreadyExists(_) => "UVM121",
            Self::EntryNotFound(_) => "UVM122",
            Self::LockUnavailable { .. } => "UVM123",
            Self::InvalidPythonSpec(_) => "UVM130",
            Self::EnvironmentCreationFailed { .. } => "UVM131",
            Self::Io { .. } => "UVM190",
        }
    }
}
