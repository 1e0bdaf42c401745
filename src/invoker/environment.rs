use std::env;
use std::path::{Path, PathBuf};

/// What the host offers for running `op`
pub trait EnvironmentProbe: Send + Sync {
    /// Absolute path of an executable named `name` on `PATH`
    fn find_executable(&self, name: &str) -> Option<PathBuf>;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Absolute form of an existing path, with symlinks resolved
    fn canonicalize(&self, path: &Path) -> std::io::Result<PathBuf>;
}

/// Probe backed by the process environment and the real filesystem
#[derive(Debug, Clone, Default)]
pub struct SystemEnvironment {
    path_override: Option<std::ffi::OsString>,
}

impl SystemEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search `path` instead of the process `PATH`
    pub fn with_search_path(path: impl Into<std::ffi::OsString>) -> Self {
        Self {
            path_override: Some(path.into()),
        }
    }
}

impl EnvironmentProbe for SystemEnvironment {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        let search = self.path_override.clone().or_else(|| env::var_os("PATH"))?;
        env::split_paths(&search)
            .filter(|dir| !dir.as_os_str().is_empty())
            .flat_map(|dir| candidates(&dir, name))
            .find(|candidate| is_executable(candidate))
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn canonicalize(&self, path: &Path) -> std::io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }
}

#[cfg(windows)]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    ["", ".exe", ".cmd", ".bat"]
        .iter()
        .map(|ext| dir.join(format!("{}{}", name, ext)))
        .collect()
}

#[cfg(not(windows))]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(name)]
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
