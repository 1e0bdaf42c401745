//! FileSystem trait definition

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Type of file system entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

/// A directory entry returned by read_dir
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: PathBuf,
    pub name: String,
    pub file_type: FileType,
}

impl DirEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// Read-only abstraction over the caller's repository checkout.
///
/// Manifest parsing and language detection only ever read; nothing in this crate
/// writes through this trait.
pub trait FileSystem: Send + Sync {
    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Check if path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// List directory entries, sorted by name
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Read a file that may legitimately be absent.
    ///
    /// `Ok(None)` when the file does not exist, `Err` when it exists but cannot be read.
    fn read_optional(&self, path: &Path) -> Result<Option<String>> {
        if !self.is_file(path) {
            return Ok(None);
        }
        self.read_to_string(path).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    #[test]
    fn test_read_optional_missing_file() {
        let fs = MockFileSystem::new();
        let result = fs.read_optional(Path::new("/mock/absent.txt")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_read_optional_present_file() {
        let fs = MockFileSystem::new();
        fs.add_file("go.mod", "module example.com/app\n");
        let result = fs.read_optional(Path::new("/mock/go.mod")).unwrap();
        assert_eq!(result.as_deref(), Some("module example.com/app\n"));
    }

    #[test]
    fn test_read_dir_sorted() {
        let fs = MockFileSystem::new();
        fs.add_file("web/package.json", "{}");
        fs.add_dir("api");
        fs.add_file("README.md", "# repo");

        let names: Vec<String> = fs
            .read_dir(Path::new("/mock"))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["README.md", "api", "web"]);
    }

    #[test]
    fn test_read_optional_directory_is_none() {
        let fs = MockFileSystem::new();
        fs.add_dir("api");
        assert!(fs.read_optional(Path::new("/mock/api")).unwrap().is_none());
    }
}
