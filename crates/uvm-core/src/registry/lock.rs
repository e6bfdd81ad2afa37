use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs4::FileExt;
use tracing::{debug, warn};
use uvm_domain::{Result, UvmError};

use super::persist::ensure_directory;

/// Cross-process advisory locking on an open file handle.
pub trait FileLocker: Send + Sync {
    fn lock(&self, file: &File) -> io::Result<()>;
    fn unlock(&self, file: &File) -> io::Result<()>;
}

/// `flock` on Unix and `LockFileEx` on Windows, via fs4.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fs4Locker;

impl FileLocker for Fs4Locker {
    fn lock(&self, file: &File) -> io::Result<()> {
        FileExt::lock_exclusive(file)
    }

    fn unlock(&self, file: &File) -> io::Result<()> {
        FileExt::unlock(file)
    }
}

#[must_use]
pub fn default_locker() -> Arc<dyn FileLocker> {
    Arc::new(Fs4Locker)
}

/// Scoped hold on the registry lock file; released on drop.
pub(crate) struct RegistryLock<'a> {
    file: File,
    path: PathBuf,
    locker: &'a dyn FileLocker,
    held: bool,
}

impl<'a> RegistryLock<'a> {
    /// Blocks until the lock is held. Without `strict`, a locking failure is
    /// logged and the caller proceeds unlocked.
    pub(crate) fn acquire(path: &Path, locker: &'a dyn FileLocker, strict: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            ensure_directory(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|err| UvmError::io("failed to open registry lock", path, err))?;

        let held = match locker.lock(&file) {
            Ok(()) => true,
            Err(err) if strict => {
                return Err(UvmError::LockUnavailable {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
            Err(err) => {
                warn!(
                    %err,
                    path = %path.display(),
                    "registry lock unavailable; proceeding without it"
                );
                false
            }
        };
        if held {
            debug!(path = %path.display(), "acquired registry lock");
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
            locker,
            held,
        })
    }
}

impl Drop for RegistryLock<'_> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        if let Err(err) = self.locker.unlock(&self.file) {
            warn!(%err, path = %self.path.display(), "failed to release registry lock");
        }
    }
}
