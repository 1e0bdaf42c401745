//! Language and version detection for artifact context directories
//!
//! Detection walks a fixed, ordered table of probes. The first probe whose marker
//! file exists in the context directory decides the language: a directory that
//! holds both `go.mod` and `package.json` is reported as Go, without an ambiguity
//! error. Each probe then works out a version:
//!
//! - a version declared in the marker (or its companion version file) is returned
//!   verbatim with [`Confidence::Exact`];
//! - otherwise the ecosystem's "latest stable" literal, if it has one, is returned
//!   with [`Confidence::Inferred`];
//! - otherwise no version, [`Confidence::Default`].
//!
//! Detection never fails. Unreadable or undecodable marker files degrade to
//! [`Confidence::Default`] with a note, and a directory no probe recognises is
//! reported as [`LanguageId::Unknown`].

mod go;
mod java;
mod node;
mod python;
mod rust;

use crate::fs::FileSystem;
use crate::stack::LanguageId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// How a detected version was obtained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Declared explicitly by the project
    Exact,
    /// Ecosystem "latest stable" convention
    Inferred,
    /// Nothing determinable; the toolchain's own default applies
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LanguageDetection {
    pub language: LanguageId,
    pub version: Option<String>,
    pub confidence: Confidence,
    /// Marker file that selected the language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    /// Why the detection is weaker than it could be
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl LanguageDetection {
    pub fn unknown() -> Self {
        Self {
            language: LanguageId::Unknown,
            version: None,
            confidence: Confidence::Default,
            marker: None,
            note: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.language == LanguageId::Unknown
    }

    /// Malformed markers leave a note; clean detections do not
    pub fn is_degraded(&self) -> bool {
        self.note.is_some()
    }

    fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Outcome of a probe's version lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionProbe {
    /// Version declared in `source`
    Declared { version: String, source: String },
    /// Files decoded cleanly but declare no version
    Undeclared,
    /// A file the probe depends on could not be read or decoded
    Malformed(String),
}

/// One entry in the detection table
pub struct LanguageProbe {
    pub language: LanguageId,
    /// Any of these files selects the language
    pub markers: &'static [&'static str],
    /// "Latest stable" literal used when nothing is declared
    pub inferred_version: Option<&'static str>,
    pub probe_version: fn(&dyn FileSystem, &Path) -> VersionProbe,
}

impl LanguageProbe {
    pub fn matching_marker(&self, fs: &dyn FileSystem, context_dir: &Path) -> Option<&'static str> {
        self.markers
            .iter()
            .copied()
            .find(|marker| fs.is_file(&context_dir.join(marker)))
    }

    fn detect(&self, fs: &dyn FileSystem, context_dir: &Path, marker: &str) -> LanguageDetection {
        let base = LanguageDetection {
            language: self.language.clone(),
            version: None,
            confidence: Confidence::Default,
            marker: Some(marker.to_string()),
            note: None,
        };

        match (self.probe_version)(fs, context_dir) {
            VersionProbe::Declared { version, source } => {
                debug!(language = %self.language, %version, %source, "Declared version found");
                LanguageDetection {
                    version: Some(version),
                    confidence: Confidence::Exact,
                    ..base
                }
            }
            VersionProbe::Undeclared => match self.inferred_version {
                Some(literal) => LanguageDetection {
                    version: Some(literal.to_string()),
                    confidence: Confidence::Inferred,
                    ..base
                },
                None => base,
            },
            VersionProbe::Malformed(reason) => {
                warn!(
                    language = %self.language,
                    context = %context_dir.display(),
                    %reason,
                    "Marker could not be decoded, using toolchain default"
                );
                base.with_note(reason)
            }
        }
    }
}

static PROBES: [LanguageProbe; 5] = [
    LanguageProbe {
        language: LanguageId::Go,
        markers: go::MARKERS,
        inferred_version: Some("stable"),
        probe_version: go::probe_version,
    },
    LanguageProbe {
        language: LanguageId::Rust,
        markers: rust::MARKERS,
        inferred_version: Some("stable"),
        probe_version: rust::probe_version,
    },
    LanguageProbe {
        language: LanguageId::Node,
        markers: node::MARKERS,
        inferred_version: Some("lts/*"),
        probe_version: node::probe_version,
    },
    LanguageProbe {
        language: LanguageId::Python,
        markers: python::MARKERS,
        inferred_version: Some("3.x"),
        probe_version: python::probe_version,
    },
    LanguageProbe {
        language: LanguageId::Java,
        markers: java::MARKERS,
        inferred_version: None,
        probe_version: java::probe_version,
    },
];

/// The detection table in priority order
pub fn probes() -> &'static [LanguageProbe] {
    &PROBES
}

/// Detect the language and version of one artifact context directory.
pub fn detect(fs: &dyn FileSystem, context_dir: &Path) -> LanguageDetection {
    if !fs.is_dir(context_dir) {
        warn!(context = %context_dir.display(), "Context directory missing");
        return LanguageDetection::unknown()
            .with_note(format!("{} is not a directory", context_dir.display()));
    }

    for probe in probes() {
        if let Some(marker) = probe.matching_marker(fs, context_dir) {
            debug!(language = %probe.language, marker, "Marker matched");
            return probe.detect(fs, context_dir, marker);
        }
    }

    debug!(context = %context_dir.display(), "No language marker found");
    LanguageDetection::unknown()
}

/// Read a file the probe depends on, mapping read failures to [`VersionProbe::Malformed`].
pub(crate) fn read_optional(
    fs: &dyn FileSystem,
    context_dir: &Path,
    name: &str,
) -> Result<Option<String>, VersionProbe> {
    fs.read_optional(&context_dir.join(name))
        .map_err(|e| VersionProbe::Malformed(format!("{} could not be read: {:#}", name, e)))
}

/// First non-empty, non-comment line of a single-value version file (`.nvmrc` etc.)
pub(crate) fn version_file_value(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
}

/// Returns early from a probe with the `Malformed` outcome
macro_rules! try_probe {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(outcome) => return outcome,
        }
    };
}
pub(crate) use try_probe;
