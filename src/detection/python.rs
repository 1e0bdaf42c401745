use super::{read_optional, try_probe, version_file_value, VersionProbe};
use crate::fs::FileSystem;
use std::path::Path;

pub(super) const MARKERS: &[&str] = &["requirements.txt", "pyproject.toml", "Pipfile"];

pub(super) fn probe_version(fs: &dyn FileSystem, context_dir: &Path) -> VersionProbe {
    if let Some(content) = try_probe!(read_optional(fs, context_dir, "pyproject.toml")) {
        let pyproject: toml::Value = match toml::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                return VersionProbe::Malformed(format!("pyproject.toml is not valid TOML: {}", e))
            }
        };
        if let Some(requires) = pyproject
            .get("project")
            .and_then(|p| p.get("requires-python"))
            .and_then(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
        {
            return VersionProbe::Declared {
                version: requires.trim().to_string(),
                source: "pyproject.toml".to_string(),
            };
        }
    }

    if let Some(content) = try_probe!(read_optional(fs, context_dir, ".python-version")) {
        if let Some(version) = version_file_value(&content) {
            return VersionProbe::Declared {
                version,
                source: ".python-version".to_string(),
            };
        }
    }

    if let Some(content) = try_probe!(read_optional(fs, context_dir, "Pipfile")) {
        let pipfile: toml::Value = match toml::from_str(&content) {
            Ok(value) => value,
            Err(e) => return VersionProbe::Malformed(format!("Pipfile is not valid TOML: {}", e)),
        };
        if let Some(version) = pipfile
            .get("requires")
            .and_then(|r| r.get("python_version").or_else(|| r.get("python_full_version")))
            .and_then(|v| v.as_str())
        {
            return VersionProbe::Declared {
                version: version.to_string(),
                source: "Pipfile".to_string(),
            };
        }
    }

    VersionProbe::Undeclared
}
