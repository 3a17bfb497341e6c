//! Finding host tools in `PATH`

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use pflash_core::error::{Error, Result};

/// Find executable `name` in a `PATH`-style list of directories
pub fn find_in_path(name: &str, path: &OsStr) -> Option<PathBuf> {
    let file = format!("{}{}", name, env::consts::EXE_SUFFIX);
    env::split_paths(path)
        .map(|dir| dir.join(&file))
        .find(|candidate| is_executable(candidate))
}

/// Find executable `name` in the process `PATH`
pub fn which(name: &str) -> Result<PathBuf> {
    let path = env::var_os("PATH")
        .ok_or_else(|| Error::PrerequisiteMissing("PATH is not set".to_string()))?;
    find_in_path(name, &path)
        .ok_or_else(|| Error::PrerequisiteMissing(format!("{} binary not found in PATH", name)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
