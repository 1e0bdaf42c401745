use super::{read_optional, try_probe, version_file_value, VersionProbe};
use crate::fs::FileSystem;
use std::path::Path;

pub(super) const MARKERS: &[&str] = &["Cargo.toml"];

/// Toolchain files take precedence over `package.rust-version`, matching rustup.
pub(super) fn probe_version(fs: &dyn FileSystem, context_dir: &Path) -> VersionProbe {
    let manifest = match try_probe!(read_optional(fs, context_dir, "Cargo.toml")) {
        Some(content) => content,
        None => return VersionProbe::Undeclared,
    };
    let manifest: toml::Value = match toml::from_str(&manifest) {
        Ok(value) => value,
        Err(e) => return VersionProbe::Malformed(format!("Cargo.toml is not valid TOML: {}", e)),
    };

    if let Some(content) = try_probe!(read_optional(fs, context_dir, "rust-toolchain.toml")) {
        let toolchain: toml::Value = match toml::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                return VersionProbe::Malformed(format!(
                    "rust-toolchain.toml is not valid TOML: {}",
                    e
                ))
            }
        };
        if let Some(channel) = toolchain
            .get("toolchain")
            .and_then(|t| t.get("channel"))
            .and_then(|c| c.as_str())
        {
            return declared(channel, "rust-toolchain.toml");
        }
    }

    if let Some(content) = try_probe!(read_optional(fs, context_dir, "rust-toolchain")) {
        if let Some(channel) = version_file_value(&content) {
            return declared(&channel, "rust-toolchain");
        }
    }

    if let Some(version) = manifest
        .get("package")
        .and_then(|p| p.get("rust-version"))
        .and_then(|v| v.as_str())
    {
        return declared(version, "Cargo.toml");
    }

    VersionProbe::Undeclared
}

fn declared(version: &str, source: &str) -> VersionProbe {
    VersionProbe::Declared {
        version: version.to_string(),
        source: source.to_string(),
    }
}
