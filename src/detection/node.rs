use super::{read_optional, try_probe, version_file_value, VersionProbe};
use crate::fs::FileSystem;
use serde_json::Value;
use std::path::Path;

pub(super) const MARKERS: &[&str] = &["package.json"];

pub(super) fn probe_version(fs: &dyn FileSystem, context_dir: &Path) -> VersionProbe {
    let content = match try_probe!(read_optional(fs, context_dir, "package.json")) {
        Some(content) => content,
        None => return VersionProbe::Undeclared,
    };
    let package: Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            return VersionProbe::Malformed(format!("package.json is not valid JSON: {}", e))
        }
    };

    if let Some(engine) = package
        .get("engines")
        .and_then(|e| e.get("node"))
        .and_then(|n| n.as_str())
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        return VersionProbe::Declared {
            version: engine.to_string(),
            source: "package.json".to_string(),
        };
    }

    for file in [".nvmrc", ".node-version"] {
        if let Some(content) = try_probe!(read_optional(fs, context_dir, file)) {
            if let Some(version) = version_file_value(&content) {
                return VersionProbe::Declared {
                    version,
                    source: file.to_string(),
                };
            }
        }
    }

    VersionProbe::Undeclared
}
