#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use uvm_core::{EntryFields, EnvSnapshot, EnvironmentEntry, UVM_HOME_ENV};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Temporary `UVM_HOME` plus a snapshot pointing at it.
pub fn uvm_home(prefix: &str) -> (TempDir, EnvSnapshot) {
    init_tracing();
    let temp = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir");
    let env = EnvSnapshot::from_pairs([(UVM_HOME_ENV, temp.path().display().to_string())]);
    (temp, env)
}

pub fn managed_dir(home: &Path, name: &str) -> PathBuf {
    let path = home.join("envs").join(name);
    fs::create_dir_all(&path).expect("create env dir");
    path
}

pub fn entry(name: &str, location: &Path) -> EnvironmentEntry {
    EntryFields::new(name, location)
        .python_version("3.11.0")
        .build()
        .expect("entry")
}

pub fn names(entries: &[EnvironmentEntry]) -> Vec<String> {
    entries.iter().map(|entry| entry.name().to_string()).collect()
}
