use std::fs;
use std::path::{Path, PathBuf};

pub const PYVENV_CFG: &str = "pyvenv.cfg";

const VERSION_KEYS: [&str; 2] = ["version", "version_info"];

pub fn scripts_dir(env_path: &Path) -> PathBuf {
    if cfg!(windows) {
        env_path.join("Scripts")
    } else {
        env_path.join("bin")
    }
}

pub fn interpreter_path(env_path: &Path) -> PathBuf {
    if cfg!(windows) {
        scripts_dir(env_path).join("python.exe")
    } else {
        scripts_dir(env_path).join("python")
    }
}

/// True when `env_path` looks like a usable environment: a directory with a
/// `pyvenv.cfg`, a scripts directory, and an interpreter inside it.
pub fn validate_environment(env_path: &Path) -> bool {
    env_path.is_dir()
        && env_path.join(PYVENV_CFG).is_file()
        && scripts_dir(env_path).is_dir()
        && interpreter_path(env_path).exists()
}

/// Version recorded in the environment's `pyvenv.cfg` (first `version` or
/// `version_info` line, quotes stripped). Missing or unreadable files yield
/// `None`.
pub fn python_version(env_path: &Path) -> Option<String> {
    let contents = fs::read_to_string(env_path.join(PYVENV_CFG)).ok()?;
    contents.lines().find_map(|line| {
        let (key, value) = line.trim().split_once('=')?;
        if !VERSION_KEYS.contains(&key.trim()) {
            return None;
        }
        Some(
            value
                .trim()
                .trim_matches('"')
                .trim_matches('\'')
                .to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scaffold(root: &Path, cfg: Option<&str>, scripts: bool, interpreter: bool) -> PathBuf {
        let env_path = root.join("venv");
        fs::create_dir_all(&env_path).expect("create dir");
        if let Some(cfg) = cfg {
            fs::write(env_path.join(PYVENV_CFG), cfg).expect("write file");
        }
        if scripts {
            fs::create_dir_all(scripts_dir(&env_path)).expect("create dir");
        }
        if interpreter {
            fs::write(interpreter_path(&env_path), "# interpreter").expect("write file");
        }
        env_path
    }

    #[test]
    fn complete_layout_is_valid() {
        let temp = TempDir::new().expect("tempdir");
        let env_path = scaffold(temp.path(), Some("version = 3.11.0\n"), true, true);
        assert!(validate_environment(&env_path));
    }

    #[test]
    fn incomplete_layouts_are_invalid() {
        let temp = TempDir::new().expect("tempdir");
        assert!(!validate_environment(&temp.path().join("missing")));

        let bare = scaffold(temp.path(), None, false, false);
        assert!(!validate_environment(&bare));

        let no_scripts = scaffold(
            &temp.path().join("a"),
            Some("version = 3.11\n"),
            false,
            false,
        );
        assert!(!validate_environment(&no_scripts));

        let no_python = scaffold(
            &temp.path().join("b"),
            Some("version = 3.11\n"),
            true,
            false,
        );
        assert!(!validate_environment(&no_python));

        let file = temp.path().join("plain-file");
        fs::write(&file, "").expect("write file");
        assert!(!validate_environment(&file));
    }

    #[test]
    fn version_info_is_extracted() {
        let temp = TempDir::new().expect("tempdir");
        let env_path = scaffold(
            temp.path(),
            Some(concat!(
                "home = /usr/bin/python3\n",
                "implementation = CPython\n",
                "version_info = 3.11.0.final.0\n",
            )),
            false,
            false,
        );
        assert_eq!(python_version(&env_path).as_deref(), Some("3.11.0.final.0"));
    }

    #[test]
    fn first_version_key_wins_and_quotes_are_stripped() {
        let temp = TempDir::new().expect("tempdir");
        let env_path = scaffold(
            temp.path(),
            Some("comment line\nversion = \"3.12.1\"\nversion_info = 3.12.1.final.0\n"),
            false,
            false,
        );
        assert_eq!(python_version(&env_path).as_deref(), Some("3.12.1"));
    }

    #[test]
    fn missing_config_or_key_yields_none() {
        let temp = TempDir::new().expect("tempdir");
        let no_cfg = scaffold(temp.path(), None, false, false);
        assert_eq!(python_version(&no_cfg), None);

        let no_key = scaffold(
            &temp.path().join("other"),
            Some("home = /usr/bin/python3\nimplementation = CPython\n"),
            false,
            false,
        );
        assert_eq!(python_version(&no_key), None);
    }
}
