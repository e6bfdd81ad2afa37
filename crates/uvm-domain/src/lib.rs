#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod entry;
pub mod env;
pub mod error;
pub mod paths;

pub use entry::{EntryFields, EnvironmentEntry};
pub use env::{EnvSnapshot, UVM_HOME_ENV};
pub use error::{Result, UvmError};
pub use paths::{
    ensure_managed_env_path, expand_user_path, home_dir, is_within_home, managed_env_root,
    normalize_env_path, uvm_home, validate_safe_path,
};
