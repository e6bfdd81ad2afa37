//! Creating environments with the external `uv venv` tool and turning the
//! result into an [`EnvironmentEntry`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result as AnyResult};
use time::OffsetDateTime;
use tracing::{debug, error};
use uvm_domain::{
    managed_env_root, validate_safe_path, EntryFields, EnvSnapshot, EnvironmentEntry, Result,
    UvmError,
};

use crate::config::ProvisionerConfig;
use crate::process::{run_command, RunOutput};

mod venv;

pub use venv::{interpreter_path, python_version, scripts_dir, validate_environment, PYVENV_CFG};

/// The external command that materializes an environment on disk.
pub trait ProvisionTool: Send + Sync {
    /// Human-readable program name for logs and errors.
    fn program(&self) -> &str;

    /// Creates an environment at `location`. A non-zero exit is reported in
    /// the returned output, not as an error.
    fn create_venv(
        &self,
        location: &Path,
        python: Option<&str>,
        env: &EnvSnapshot,
    ) -> AnyResult<RunOutput>;
}

/// Runs `<program> venv [--python <spec>] <location>`, resolving the program
/// against the snapshot's `PATH`.
#[derive(Clone, Debug, Default)]
pub struct SystemProvisionTool {
    config: ProvisionerConfig,
}

impl SystemProvisionTool {
    pub fn new(config: ProvisionerConfig) -> Self {
        Self { config }
    }

    fn resolve_program(&self, env: &EnvSnapshot) -> AnyResult<PathBuf> {
        let cwd = std::env::current_dir().context("failed to read current directory")?;
        which::which_in(&self.config.program, env.var("PATH"), cwd)
            .with_context(|| format!("`{}` was not found on PATH", self.config.program))
    }
}

impl ProvisionTool for SystemProvisionTool {
    fn program(&self) -> &str {
        &self.config.program
    }

    fn create_venv(
        &self,
        location: &Path,
        python: Option<&str>,
        env: &EnvSnapshot,
    ) -> AnyResult<RunOutput> {
        let program = self.resolve_program(env)?;
        let args = venv_args(location, python);
        debug!(program = %program.display(), ?args, "creating environment");
        run_command(&program, &args, &env.pairs())
    }
}

pub(crate) fn venv_args(location: &Path, python: Option<&str>) -> Vec<String> {
    let mut args = vec!["venv".to_string()];
    if let Some(python) = python {
        args.push("--python".to_string());
        args.push(python.to_string());
    }
    args.push(location.display().to_string());
    args
}

pub struct Provisioner<'a> {
    tool: &'a dyn ProvisionTool,
}

impl<'a> Provisioner<'a> {
    pub fn new(tool: &'a dyn ProvisionTool) -> Self {
        Self { tool }
    }

    /// Creates the environment and returns an entry ready to be registered.
    /// `env` supplies both the managed root (via `UVM_HOME`) and the child's
    /// environment.
    pub fn create_environment(
        &self,
        name: &str,
        location: &Path,
        python: Option<&str>,
        env: &EnvSnapshot,
    ) -> Result<EnvironmentEntry> {
        if name.trim().is_empty() {
            return Err(UvmError::InvalidEntry(
                "environment name cannot be blank".to_string(),
            ));
        }
        if let Some(python) = python {
            check_python_spec(python)?;
        }
        let env_path = validate_safe_path(location, true)?;

        let output = self
            .tool
            .create_venv(&env_path, python, env)
            .map_err(|err| UvmError::EnvironmentCreationFailed {
                path: env_path.clone(),
                reason: format!("{err:#}"),
            })?;
        if !output.success() {
            error!(
                program = self.tool.program(),
                code = output.code,
                path = %env_path.display(),
                "environment creation failed"
            );
            return Err(UvmError::EnvironmentCreationFailed {
                path: env_path,
                reason: output.diagnostic(),
            });
        }
        if !validate_environment(&env_path) {
            return Err(UvmError::EnvironmentCreationFailed {
                path: env_path,
                reason: "created environment is invalid".to_string(),
            });
        }

        let is_project_local = !env_path.starts_with(managed_env_root(env)?);
        let mut fields = EntryFields::new(name, env_path.as_path())
            .created_at(OffsetDateTime::now_utc())
            .project_local(is_project_local);
        if let Some(version) = python_version(&env_path) {
            fields = fields.python_version(version);
        }
        fields.build()
    }
}

/// Convenience wrapper using the system tool configured from `env`.
pub fn create_environment(
    name: &str,
    location: &Path,
    python: Option<&str>,
    env: &EnvSnapshot,
) -> Result<EnvironmentEntry> {
    let tool = SystemProvisionTool::new(ProvisionerConfig::from_snapshot(env));
    Provisioner::new(&tool).create_environment(name, location, python, env)
}

/// Version specifiers are handed to a subprocess, so only word characters,
/// dots and hyphens are accepted.
fn check_python_spec(spec: &str) -> Result<()> {
    let allowed = !spec.is_empty()
        && spec
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '.' | '-'));
    if allowed {
        Ok(())
    } else {
        Err(UvmError::InvalidPythonSpec(spec.to_string()))
    }
}
