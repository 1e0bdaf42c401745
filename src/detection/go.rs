use super::{read_optional, try_probe, VersionProbe};
use crate::fs::FileSystem;
use regex::Regex;
use std::path::Path;

pub(super) const MARKERS: &[&str] = &["go.mod"];

pub(super) fn probe_version(fs: &dyn FileSystem, context_dir: &Path) -> VersionProbe {
    let content = match try_probe!(read_optional(fs, context_dir, "go.mod")) {
        Some(content) => content,
        None => return VersionProbe::Undeclared,
    };

    match parse_go_directive(&content) {
        Some(version) => VersionProbe::Declared {
            version,
            source: "go.mod".to_string(),
        },
        None => VersionProbe::Undeclared,
    }
}

/// The `go` directive verbatim (`1.22`, `1.22.3`, `1.23rc1`); the toolchain
/// directive is ignored
fn parse_go_directive(content: &str) -> Option<String> {
    Regex::new(r"(?m)^go[ \t]+([^\s/]+)\s*(?://.*)?$")
        .ok()
        .and_then(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
