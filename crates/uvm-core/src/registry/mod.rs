//! JSON-backed registry of named environments.
//!
//! Reads are served from an in-memory cache loaded lazily on first use.
//! Every mutation takes the process mutex, then the cross-process lock file,
//! re-reads the file, applies the change and atomically rewrites the whole
//! document before releasing the lock.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use uvm_domain::{
    ensure_managed_env_path, normalize_env_path, uvm_home, validate_safe_path, EnvSnapshot,
    EnvironmentEntry, Result, UvmError,
};

use crate::config::RegistryOptions;

mod lock;
mod persist;
mod state;

pub use lock::{default_locker, FileLocker, Fs4Locker};
pub use state::REGISTRY_VERSION;

use lock::RegistryLock;
use persist::{ensure_directory, write_atomic};
use state::{decode, encode, Entries, RegistryState};

pub const REGISTRY_FILENAME: &str = "registry.json";
const LOCK_SUFFIX: &str = ".lock";

pub struct Registry {
    path: PathBuf,
    lock_path: PathBuf,
    env: EnvSnapshot,
    options: RegistryOptions,
    locker: Arc<dyn FileLocker>,
    // Not re-entrant: a `FileLocker` must not call back into the registry.
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("path", &self.path)
            .field("lock_path", &self.lock_path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Opens the registry at `path`, or at `<UVM_HOME>/registry.json` when no
    /// path is given. Nothing is read until the first operation.
    pub fn open(path: Option<&Path>, env: EnvSnapshot, options: RegistryOptions) -> Result<Self> {
        let path = match path {
            Some(path) => normalize_env_path(path)?,
            None => normalize_env_path(uvm_home(&env)?.join(REGISTRY_FILENAME))?,
        };
        let path = validate_safe_path(&path, true)?;
        let mut lock_name = OsString::from(path.as_os_str());
        lock_name.push(LOCK_SUFFIX);

        Ok(Self {
            lock_path: PathBuf::from(lock_name),
            path,
            env,
            options,
            locker: default_locker(),
            state: Mutex::new(RegistryState::unloaded()),
        })
    }

    #[must_use]
    pub fn with_locker(mut self, locker: Arc<dyn FileLocker>) -> Self {
        self.locker = locker;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    /// All entries; with `validate`, entries whose location is gone are
    /// filtered out (checked on every call).
    pub fn list_environments(&self, validate: bool) -> Result<Vec<EnvironmentEntry>> {
        let mut entries: Vec<EnvironmentEntry> = {
            let mut state = self.state();
            self.ensure_loaded(&mut state)?;
            state.entries.values().cloned().collect()
        };
        if validate {
            entries.retain(EnvironmentEntry::location_exists);
        }
        Ok(entries)
    }

    pub fn get(&self, name: &str, validate: bool) -> Result<Option<EnvironmentEntry>> {
        let entry = {
            let mut state = self.state();
            self.ensure_loaded(&mut state)?;
            state.entries.get(name).cloned()
        };
        Ok(entry.filter(|entry| !validate || entry.location_exists()))
    }

    pub fn add(
        &self,
        entry: EnvironmentEntry,
        overwrite: bool,
        require_managed: bool,
    ) -> Result<()> {
        if require_managed {
            ensure_managed_env_path(entry.location(), &self.env)?;
        }
        self.mutate(|entries| {
            if !overwrite && entries.contains_key(entry.name()) {
                return Err(UvmError::EntryAlreadyExists(entry.name().to_string()));
            }
            entries.insert(entry.name().to_string(), entry);
            Ok(((), true))
        })
    }

    pub fn update(&self, entry: EnvironmentEntry) -> Result<()> {
        self.mutate(|entries| {
            let Some(slot) = entries.get_mut(entry.name()) else {
                return Err(UvmError::EntryNotFound(entry.name().to_string()));
            };
            *slot = entry;
            Ok(((), true))
        })
    }

    /// Returns false, without writing, when `name` is not registered.
    pub fn remove(&self, name: &str) -> Result<bool> {
        self.mutate(|entries| {
            let removed = entries.shift_remove(name).is_some();
            Ok((removed, removed))
        })
    }

    /// Drops every entry whose location no longer exists and returns their
    /// names in registry order. Writes only when something was removed.
    pub fn sync(&self) -> Result<Vec<String>> {
        self.mutate(|entries| {
            let stale: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| !entry.location_exists())
                .map(|(name, _)| name.clone())
                .collect();
            for name in &stale {
                entries.shift_remove(name);
            }
            let changed = !stale.is_empty();
            Ok((stale, changed))
        })
    }

    /// Discards the cache and loads the file again.
    pub fn reload(&self) -> Result<()> {
        let mut state = self.state();
        state.reset();
        self.ensure_loaded(&mut state)
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_loaded(&self, state: &mut RegistryState) -> Result<()> {
        if state.is_loaded() {
            return Ok(());
        }
        let entries = if self.path.exists() {
            let _lock = self.acquire_lock()?;
            self.read_from_disk()?
        } else {
            Entries::new()
        };
        state.replace(entries);
        Ok(())
    }

    /// Runs `apply` against the on-disk registry under both locks. `apply`
    /// returns its result and whether the document changed; unchanged
    /// documents are not rewritten. The cache only adopts the new entries
    /// once they are safely on disk.
    fn mutate<T>(&self, apply: impl FnOnce(&mut Entries) -> Result<(T, bool)>) -> Result<T> {
        let mut state = self.state();
        if let Some(parent) = self.path.parent() {
            ensure_directory(parent)?;
        }
        let _lock = self.acquire_lock()?;

        let current = self.read_from_disk()?;
        let mut updated = current.clone();
        let (value, changed) = match apply(&mut updated) {
            Ok(outcome) => outcome,
            Err(err) => {
                state.replace(current);
                return Err(err);
            }
        };
        if !changed {
            state.replace(current);
            return Ok(value);
        }

        let persisted = encode(&updated)
            .and_then(|document| write_atomic(&self.path, document.as_bytes()));
        if let Err(err) = persisted {
            state.replace(current);
            return Err(err);
        }
        debug!(
            path = %self.path.display(),
            entries = updated.len(),
            "persisted environment registry"
        );
        state.replace(updated);
        Ok(value)
    }

    fn acquire_lock(&self) -> Result<RegistryLock<'_>> {
        RegistryLock::acquire(
            &self.lock_path,
            self.locker.as_ref(),
            self.options.strict_locking,
        )
    }

    fn read_from_disk(&self) -> Result<Entries> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                return Err(UvmError::RegistryCorrupted(format!(
                    "registry file {} is not valid UTF-8",
                    self.path.display()
                )))
            }
            Err(err) => return Err(UvmError::io("failed to read registry", &self.path, err)),
        };
        let entries = decode(&contents)?;
        debug!(
            path = %self.path.display(),
            entries = entries.len(),
            "loaded environment registry"
        );
        Ok(entries)
    }
}
