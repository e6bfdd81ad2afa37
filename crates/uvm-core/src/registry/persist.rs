use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::warn;
use uvm_domain::{Result, UvmError};

const DIR_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;

/// Creates `path` (and parents) and restricts it to the current user.
/// Permission failures are logged, not fatal.
pub(crate) fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|err| UvmError::io("failed to create directory", path, err))?;
    restrict_permissions(path, DIR_MODE);
    Ok(())
}

/// Replaces `path` with `contents` through a uniquely named sibling temp file
/// and a rename. Readers see either the old file or the new one; on failure
/// the temp file is removed and the old file is left untouched.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = format!(
        "{}.tmp-",
        path.file_name()
            .map_or_else(|| "registry".into(), |name| name.to_string_lossy())
    );

    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .tempfile_in(parent)
        .map_err(|err| UvmError::io("failed to create temporary file in", parent, err))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|err| UvmError::io("failed to write temporary file", tmp.path(), err))?;
    restrict_permissions(tmp.path(), FILE_MODE);

    tmp.persist(path)
        .map_err(|err| UvmError::io("failed to replace registry at", path, err.error))?;
    restrict_permissions(path, FILE_MODE);
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        warn!(%err, path = %path.display(), "failed to restrict permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(path: &Path, _mode: u32) {
    let Ok(meta) = fs::metadata(path) else {
        warn!(path = %path.display(), "failed to inspect permissions");
        return;
    };
    if meta.permissions().readonly() {
        warn!(path = %path.display(), "path is read-only; leaving permissions unchanged");
    }
}
