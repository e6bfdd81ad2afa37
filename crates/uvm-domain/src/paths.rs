//! Path normalization and the safety policies applied to every location the
//! registry stores or the provisioner creates.

use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::env::{EnvSnapshot, UVM_HOME_ENV};
use crate::error::{Result, UvmError};

const DEFAULT_HOME_SUBDIR: &str = ".uvm";
const MANAGED_ENVS_DIRNAME: &str = "envs";

pub fn home_dir() -> Result<PathBuf> {
    dirs_next::home_dir().ok_or_else(|| UvmError::invalid_path("~", "home directory not found"))
}

/// Expands a leading `~` component into the home directory.
///
/// Symlinks are left alone; see [`normalize_env_path`] for canonicalization.
pub fn expand_user_path(value: impl AsRef<Path>) -> Result<PathBuf> {
    let path = value.as_ref();
    let expanded = match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home_dir()?,
        Ok(rest) => home_dir()?.join(rest),
        Err(_) => path.to_path_buf(),
    };
    if expanded.components().next().is_none() {
        return Err(UvmError::invalid_path(path, "path cannot be empty"));
    }
    Ok(expanded)
}

/// Absolute, symlink-resolved form of `value`. The path does not have to
/// exist: symlinks are resolved as far as the filesystem allows and missing
/// components are kept.
pub fn normalize_env_path(value: impl AsRef<Path>) -> Result<PathBuf> {
    let expanded = expand_user_path(value)?;
    resolve_lenient(&expanded)
}

pub fn validate_safe_path(value: impl AsRef<Path>, allow_outside_home: bool) -> Result<PathBuf> {
    let raw = value.as_ref();
    if raw.to_string_lossy().contains('\0') {
        return Err(UvmError::invalid_path(
            raw.to_string_lossy().replace('\0', "\\0"),
            "path cannot contain null bytes",
        ));
    }
    if raw
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(UvmError::invalid_path(
            raw,
            "path cannot contain parent directory traversal ('..')",
        ));
    }

    let normalized = normalize_env_path(raw)?;
    if !normalized.is_absolute() {
        return Err(UvmError::invalid_path(
            &normalized,
            "path must resolve to an absolute location",
        ));
    }
    if !allow_outside_home && !is_within_home(&normalized) {
        return Err(UvmError::invalid_path(
            &normalized,
            "path must be within the current user's home directory",
        ));
    }
    Ok(normalized)
}

/// True when `value` normalizes to the home directory or one of its
/// descendants. Paths that cannot be normalized are never inside home.
pub fn is_within_home(value: impl AsRef<Path>) -> bool {
    let Ok(path) = normalize_env_path(value) else {
        return false;
    };
    let Ok(home) = home_dir().and_then(|home| resolve_lenient(&home)) else {
        return false;
    };
    path.starts_with(home)
}

/// Root directory for the registry and managed environments: `UVM_HOME` when
/// set (validated, outside-home allowed), `~/.uvm` otherwise.
pub fn uvm_home(env: &EnvSnapshot) -> Result<PathBuf> {
    if let Some(raw) = env.non_empty(UVM_HOME_ENV) {
        return validate_safe_path(raw, true);
    }
    resolve_lenient(&home_dir()?.join(DEFAULT_HOME_SUBDIR))
}

pub fn managed_env_root(env: &EnvSnapshot) -> Result<PathBuf> {
    resolve_lenient(&uvm_home(env)?.join(MANAGED_ENVS_DIRNAME))
}

pub fn ensure_managed_env_path(value: impl AsRef<Path>, env: &EnvSnapshot) -> Result<PathBuf> {
    let normalized = validate_safe_path(value, true)?;
    let root = managed_env_root(env)?;
    if !normalized.starts_with(&root) {
        return Err(UvmError::OutsideManagedRoot {
            path: normalized,
            root,
        });
    }
    Ok(normalized)
}

/// Mirrors a non-strict `realpath`: the deepest existing prefix of the raw
/// path is canonicalized by the OS, then the remaining components are
/// applied one at a time, with `..` popping the already resolved prefix and
/// each component that exists being canonicalized again.
fn resolve_lenient(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map_err(|err| UvmError::io("failed to read current directory for", path, err))?
            .join(path)
    };
    let components: Vec<Component<'_>> = absolute.components().collect();

    let mut split = components.len();
    let mut resolved = loop {
        let prefix: PathBuf = components[..split].iter().collect();
        if let Ok(canonical) = fs::canonicalize(&prefix) {
            break canonical;
        }
        if split <= 1 {
            break prefix;
        }
        split -= 1;
    };

    for component in &components[split..] {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => {
                resolved.push(other.as_os_str());
                if let Ok(canonical) = fs::canonicalize(&resolved) {
                    resolved = canonical;
                }
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot_for(home: &Path) -> EnvSnapshot {
        EnvSnapshot::from_pairs([(UVM_HOME_ENV, home.display().to_string())])
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = home_dir().expect("home");
        assert_eq!(expand_user_path("~").expect("expand"), home);
        assert_eq!(
            expand_user_path("~/projects/demo").expect("expand"),
            home.join("projects").join("demo")
        );
    }

    #[test]
    fn empty_path_is_rejected() {
        let err = expand_user_path("").expect_err("rejected");
        assert!(matches!(err, UvmError::InvalidPath { .. }), "{err}");
    }

    #[test]
    fn traversal_is_rejected() {
        let err = validate_safe_path("../evil", false).expect_err("rejected");
        assert!(matches!(err, UvmError::InvalidPath { .. }), "{err}");
        let err = validate_safe_path("/tmp/a/../../etc", true).expect_err("rejected");
        assert!(matches!(err, UvmError::InvalidPath { .. }), "{err}");
    }

    #[test]
    fn null_bytes_are_rejected() {
        let err = validate_safe_path("/tmp/evil\0name", true).expect_err("rejected");
        assert!(err.to_string().contains("null bytes"), "{err}");
    }

    #[test]
    fn outside_home_requires_opt_in() {
        let temp = TempDir::new().expect("tempdir");
        let target = temp.path().join("env");
        if is_within_home(&target) {
            return;
        }
        let err = validate_safe_path(&target, false).expect_err("rejected");
        assert!(err.to_string().contains("home directory"), "{err}");
        let normalized = validate_safe_path(&target, true).expect("allowed outside home");
        assert!(normalized.is_absolute());
    }

    #[test]
    fn within_home_identifies_descendants() {
        let home = home_dir().expect("home");
        assert!(is_within_home(home.join("nested").join("dir")));
        assert!(is_within_home(&home));
        let outside = home
            .ancestors()
            .last()
            .unwrap_or_else(|| Path::new("/"))
            .join("outside-home");
        assert!(!is_within_home(outside));
    }

    #[test]
    fn normalization_keeps_missing_paths() {
        let temp = TempDir::new().expect("tempdir");
        let root = fs::canonicalize(temp.path()).expect("canonical temp");
        let missing = temp.path().join("not").join("there").join(".").join("yet");
        assert_eq!(
            normalize_env_path(&missing).expect("normalize"),
            root.join("not").join("there").join("yet")
        );
    }

    #[cfg(unix)]
    #[test]
    fn normalization_resolves_symlinks() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().expect("tempdir");
        let real = temp.path().join("real");
        fs::create_dir_all(&real).expect("real dir");
        let link = temp.path().join("link");
        symlink(&real, &link).expect("symlink");

        let normalized = normalize_env_path(link.join("child")).expect("normalize");
        assert_eq!(
            normalized,
            fs::canonicalize(&real).expect("canonical").join("child")
        );
    }

    #[cfg(unix)]
    #[test]
    fn parent_of_symlink_is_taken_from_its_target() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().expect("tempdir");
        let root = fs::canonicalize(temp.path()).expect("canonical temp");
        let target = temp.path().join("a").join("b").join("c");
        fs::create_dir_all(&target).expect("target dir");
        let link = temp.path().join("link");
        symlink(&target, &link).expect("symlink");

        let normalized = normalize_env_path(link.join("..").join("x")).expect("normalize");
        assert_eq!(normalized, root.join("a").join("b").join("x"));

        let through_missing = normalize_env_path(temp.path().join("gone").join("..").join("link"))
            .expect("normalize");
        assert_eq!(through_missing, root.join("a").join("b").join("c"));
    }

    #[test]
    fn parent_components_after_missing_paths_pop_lexically() {
        let temp = TempDir::new().expect("tempdir");
        let root = fs::canonicalize(temp.path()).expect("canonical temp");
        let path = temp
            .path()
            .join("missing")
            .join("deeper")
            .join("..")
            .join("x");
        assert_eq!(
            normalize_env_path(path).expect("normalize"),
            root.join("missing").join("x")
        );
    }

    #[test]
    fn uvm_home_defaults_under_home() {
        let expected =
            normalize_env_path(home_dir().expect("home").join(".uvm")).expect("normalize");
        let resolved = uvm_home(&EnvSnapshot::default()).expect("uvm home");
        assert_eq!(resolved, expected);
    }

    #[test]
    fn uvm_home_override_is_validated() {
        let err = uvm_home(&snapshot_for(Path::new("/tmp/../etc"))).expect_err("rejected");
        assert!(matches!(err, UvmError::InvalidPath { .. }), "{err}");
    }

    #[test]
    fn managed_paths_round_trip() {
        let temp = TempDir::new().expect("tempdir");
        let uvm_home_dir = temp.path().join("uvm-home");
        fs::create_dir_all(&uvm_home_dir).expect("uvm home");
        let env = snapshot_for(&uvm_home_dir);

        let root = managed_env_root(&env).expect("managed root");
        assert_eq!(
            root,
            normalize_env_path(uvm_home_dir.join("envs")).expect("root")
        );

        let target = root.join("demo");
        let normalized = ensure_managed_env_path(&target, &env).expect("managed");
        assert_eq!(normalized, normalize_env_path(&target).expect("normalize"));
    }

    #[test]
    fn paths_outside_managed_root_are_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let uvm_home_dir = temp.path().join("uvm-home");
        fs::create_dir_all(&uvm_home_dir).expect("uvm home");
        let env = snapshot_for(&uvm_home_dir);

        let err = ensure_managed_env_path(temp.path().join("elsewhere"), &env)
            .expect_err("outside managed root");
        assert!(matches!(err, UvmError::OutsideManagedRoot { .. }), "{err}");

        // a sibling sharing the textual prefix is still outside
        let err = ensure_managed_env_path(uvm_home_dir.join("envs-other"), &env)
            .expect_err("sibling of managed root");
        assert!(matches!(err, UvmError::OutsideManagedRoot { .. }), "{err}");
    }
}
