#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

mod config;
mod process;
pub mod provision;
pub mod registry;

pub use config::{ProvisionerConfig, RegistryOptions, STRICT_LOCKING_ENV, UV_BIN_ENV};
pub use process::RunOutput;
pub use provision::{
    create_environment, interpreter_path, python_version, scripts_dir, validate_environment,
    ProvisionTool, Provisioner, SystemProvisionTool, PYVENV_CFG,
};
pub use registry::{
    default_locker, FileLocker, Fs4Locker, Registry, REGISTRY_FILENAME, REGISTRY_VERSION,
};

pub use uvm_domain::{
    ensure_managed_env_path, expand_user_path, is_within_home, managed_env_root,
    normalize_env_path, uvm_home, validate_safe_path, EntryFields, EnvSnapshot, EnvironmentEntry,
    Result, UvmError, UVM_HOME_ENV,
};
