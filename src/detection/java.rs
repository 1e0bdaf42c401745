use super::{read_optional, try_probe, VersionProbe};
use crate::fs::FileSystem;
use regex::Regex;
use roxmltree::Document;
use std::path::Path;

pub(super) const MARKERS: &[&str] = &["pom.xml", "build.gradle", "build.gradle.kts"];

const POM_VERSION_PROPERTIES: &[&str] = &[
    "java.version",
    "maven.compiler.release",
    "maven.compiler.source",
];

pub(super) fn probe_version(fs: &dyn FileSystem, context_dir: &Path) -> VersionProbe {
    if let Some(content) = try_probe!(read_optional(fs, context_dir, "pom.xml")) {
        let doc = match Document::parse(&content) {
            Ok(doc) => doc,
            Err(e) => return VersionProbe::Malformed(format!("pom.xml is not valid XML: {}", e)),
        };
        if let Some(version) = parse_pom_version(&doc) {
            return VersionProbe::Declared {
                version,
                source: "pom.xml".to_string(),
            };
        }
    }

    for file in ["build.gradle", "build.gradle.kts"] {
        if let Some(content) = try_probe!(read_optional(fs, context_dir, file)) {
            if let Some(version) = parse_gradle_version(&content) {
                return VersionProbe::Declared {
                    version,
                    source: file.to_string(),
                };
            }
        }
    }

    VersionProbe::Undeclared
}

fn parse_pom_version(doc: &Document) -> Option<String> {
    POM_VERSION_PROPERTIES.iter().find_map(|property| {
        doc.descendants()
            .filter(|node| node.has_tag_name(*property))
            .filter_map(|node| node.text())
            .map(str::trim)
            .find(|text| !text.is_empty() && !text.starts_with("${"))
            .map(str::to_string)
    })
}

fn parse_gradle_version(content: &str) -> Option<String> {
    let toolchain = Regex::new(r"JavaLanguageVersion\.of\(\s*(\d+)\s*\)").ok()?;
    if let Some(caps) = toolchain.captures(content) {
        return Some(caps[1].to_string());
    }

    // sourceCompatibility = '17', = JavaVersion.VERSION_17, = 1.8
    let compat = Regex::new(
        r#"sourceCompatibility\s*=\s*(?:JavaVersion\.VERSION_(\d+(?:_\d+)?)|['"]?([\d.]+)['"]?)"#,
    )
    .ok()?;
    let caps = compat.captures(content)?;
    caps.get(1)
        .map(|m| m.as_str().replace('_', "."))
        .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
}
