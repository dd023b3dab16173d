use crate::error::{BackupError, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_RSYNC_PATH: &str = "/usr/bin/rsync";

/// Locate rsync: the configured well-known path first, then each directory of
/// `search_path` (a `PATH`-style list).
pub fn locate_rsync(preferred: &Path, search_path: Option<&OsStr>) -> Result<PathBuf> {
    if is_executable(preferred) {
        debug!(path = %preferred.display(), "Using rsync at configured location");
        return Ok(preferred.to_path_buf());
    }

    let found = search_path
        .into_iter()
        .flat_map(std::env::split_paths)
        .map(|dir| dir.join("rsync"))
        .find(|candidate| is_executable(candidate));

    match found {
        Some(path) => {
            info!(path = %path.display(), "rsync not at {}, found on PATH", preferred.display());
            Ok(path)
        }
        None => Err(BackupError::RsyncNotFound {
            expected: preferred.to_path_buf(),
        }),
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
