use super::{DirEntry, FileSystem, FileType};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context(format!("Failed to read file {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in
            fs::read_dir(path).context(format!("Failed to read directory {:?}", path))?
        {
            let entry = entry?;
            let file_type = if entry.file_type()?.is_dir() {
                FileType::Directory
            } else {
                FileType::File
            };
            entries.push(DirEntry {
                path: entry.path(),
                name: entry.file_name().to_string_lossy().into_owned(),
                file_type,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let base = dir.path();

        fs::create_dir(base.join("api")).unwrap();
        fs::File::create(base.join("skaffold.yaml"))
            .unwrap()
            .write_all(b"apiVersion: skaffold/v4beta1\n")
            .unwrap();
        fs::File::create(base.join("api/go.mod"))
            .unwrap()
            .write_all(b"module example.com/api\n\ngo 1.22\n")
            .unwrap();

        dir
    }

    #[test]
    fn test_exists() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        assert!(fs.exists(temp.path()));
        assert!(fs.exists(&temp.path().join("skaffold.yaml")));
        assert!(!fs.exists(&temp.path().join("nonexistent")));
    }

    #[test]
    fn test_is_dir_and_is_file() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        assert!(fs.is_dir(&temp.path().join("api")));
        assert!(!fs.is_dir(&temp.path().join("skaffold.yaml")));
        assert!(fs.is_file(&temp.path().join("api/go.mod")));
        assert!(!fs.is_file(&temp.path().join("api")));
    }

    #[test]
    fn test_read_to_string() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        let content = fs.read_to_string(&temp.path().join("api/go.mod")).unwrap();
        assert!(content.contains("go 1.22"));
    }

    #[test]
    fn test_read_dir() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        let entries = fs.read_dir(temp.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.file_name()).collect();
        assert_eq!(names, vec!["api", "skaffold.yaml"]);
        assert!(entries[0].is_dir());
    }

    #[test]
    fn test_read_missing_file_has_context() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        let err = fs
            .read_to_string(&temp.path().join("missing.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }
}
