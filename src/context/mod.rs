//! Pipeline context aggregation
//!
//! Folds per-artifact detections into the [`PipelineContext`] that drives workflow
//! generation. Artifact order follows the manifest; the language set is built by
//! first-seen insertion over that order, so an unchanged manifest always produces
//! byte-identical output.

use crate::detection::{self, Confidence, LanguageDetection};
use crate::error::{OctopilotError, Result};
use crate::fs::FileSystem;
use crate::manifest::{self, BuildManifest};
use crate::stack::LanguageId;
use indexmap::{IndexMap, IndexSet};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{info, warn};

/// Resource URI under which the pipeline context schema is published
pub const SCHEMA_URI: &str = "octopilot://pipeline-context-schema";

/// A distinct (language, version) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct LanguageVersion {
    pub language: LanguageId,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactContext {
    pub image: String,
    /// Context path as written in the manifest
    #[serde(default)]
    pub context: String,
    pub language: LanguageId,
    pub version: Option<String>,
    #[serde(default)]
    pub confidence: Confidence,
}

impl ArtifactContext {
    pub fn is_unknown(&self) -> bool {
        !self.language.is_detected()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// No probe matched the artifact's context directory
    Undetected,
    /// A marker matched but could not be decoded
    MalformedMarker,
}

/// Non-fatal detection degradation for one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionWarning {
    pub image: String,
    pub kind: WarningKind,
    pub message: String,
}

/// One row of the CI build matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildMatrixEntry {
    pub language: LanguageId,
    pub version: Option<String>,
    /// Images built with this toolchain, in manifest order
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineContext {
    pub languages: Vec<LanguageVersion>,
    pub artifacts: Vec<ArtifactContext>,
    #[serde(default)]
    pub warnings: Vec<DetectionWarning>,
}

impl PipelineContext {
    /// Pair every manifest artifact with its detection.
    ///
    /// `detections` must be in manifest order, one per artifact.
    pub fn build(manifest: &BuildManifest, detections: &[LanguageDetection]) -> Result<Self> {
        if manifest.len() != detections.len() {
            return Err(OctopilotError::InvalidArguments(format!(
                "{} artifacts but {} detections",
                manifest.len(),
                detections.len()
            )));
        }

        let mut languages: IndexSet<LanguageVersion> = IndexSet::new();
        let mut artifacts = Vec::with_capacity(manifest.len());
        let mut warnings = Vec::new();

        for (spec, detection) in manifest.artifacts().iter().zip(detections) {
            if detection.language.is_detected() {
                languages.insert(LanguageVersion {
                    language: detection.language.clone(),
                    version: detection.version.clone(),
                });
            }

            if let Some(warning) = warning_for(&spec.image, &spec.context, detection) {
                warn!(image = %warning.image, kind = ?warning.kind, "{}", warning.message);
                warnings.push(warning);
            }

            artifacts.push(ArtifactContext {
                image: spec.image.clone(),
                context: spec.context.clone(),
                language: detection.language.clone(),
                version: detection.version.clone(),
                confidence: detection.confidence,
            });
        }

        Ok(Self {
            languages: languages.into_iter().collect(),
            artifacts,
            warnings,
        })
    }

    /// Matrix rows, one per distinct (language, version) pair in first-seen order
    pub fn matrix(&self) -> Vec<BuildMatrixEntry> {
        let mut rows: IndexMap<LanguageVersion, Vec<String>> = self
            .languages
            .iter()
            .filter(|lv| lv.language.is_detected())
            .map(|lv| (lv.clone(), Vec::new()))
            .collect();

        for artifact in &self.artifacts {
            let key = LanguageVersion {
                language: artifact.language.clone(),
                version: artifact.version.clone(),
            };
            if let Some(images) = rows.get_mut(&key) {
                images.push(artifact.image.clone());
            }
        }

        rows.into_iter()
            .map(|(lv, images)| BuildMatrixEntry {
                language: lv.language,
                version: lv.version,
                images,
            })
            .collect()
    }

    /// Highest declared version per language.
    ///
    /// Only [`Confidence::Exact`] versions count; languages without one are absent.
    pub fn versions(&self) -> IndexMap<LanguageId, String> {
        let mut versions: IndexMap<LanguageId, String> = IndexMap::new();
        for artifact in &self.artifacts {
            if artifact.confidence != Confidence::Exact || !artifact.language.is_detected() {
                continue;
            }
            let Some(version) = artifact.version.as_deref() else {
                continue;
            };
            match versions.get_mut(&artifact.language) {
                Some(current) if compare_versions(version, current) == Ordering::Greater => {
                    *current = version.to_string();
                }
                Some(_) => {}
                None => {
                    versions.insert(artifact.language.clone(), version.to_string());
                }
            }
        }
        versions
    }

    pub fn unknown_artifacts(&self) -> impl Iterator<Item = &ArtifactContext> {
        self.artifacts.iter().filter(|a| a.is_unknown())
    }

    pub fn has_language(&self, language: &LanguageId) -> bool {
        self.languages.iter().any(|lv| &lv.language == language)
    }
}

fn warning_for(image: &str, context: &str, detection: &LanguageDetection) -> Option<DetectionWarning> {
    if detection.is_unknown() {
        let message = match &detection.note {
            Some(note) => format!("Language of {} not detected: {}", context, note),
            None => format!("No language marker found in {}", context),
        };
        return Some(DetectionWarning {
            image: image.to_string(),
            kind: WarningKind::Undetected,
            message,
        });
    }

    detection.note.as_ref().map(|note| DetectionWarning {
        image: image.to_string(),
        kind: WarningKind::MalformedMarker,
        message: note.clone(),
    })
}

/// Numeric-aware comparison: `1.22` sorts above `1.9`
fn compare_versions(a: &str, b: &str) -> Ordering {
    fn numbers(v: &str) -> Vec<u64> {
        v.split(|c: char| !c.is_ascii_digit())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect()
    }
    numbers(a).cmp(&numbers(b)).then_with(|| a.cmp(b))
}

/// Run detection for every artifact of a parsed manifest, in manifest order.
pub fn from_manifest(fs: &dyn FileSystem, manifest: &BuildManifest) -> Result<PipelineContext> {
    let detections: Vec<LanguageDetection> = manifest
        .artifacts()
        .iter()
        .map(|artifact| detection::detect(fs, &artifact.context_dir))
        .collect();
    PipelineContext::build(manifest, &detections)
}

/// Parse → detect → build for the manifest at `manifest_path`.
pub fn detect_project_contexts(fs: &dyn FileSystem, manifest_path: &Path) -> Result<PipelineContext> {
    let manifest = manifest::parse(fs, manifest_path)?;
    detect_parsed(fs, &manifest)
}

/// Same as [`detect_project_contexts`], locating `skaffold.yaml` inside `workspace`.
pub fn detect_workspace(fs: &dyn FileSystem, workspace: &Path) -> Result<PipelineContext> {
    let manifest = manifest::parse_workspace(fs, workspace)?;
    detect_parsed(fs, &manifest)
}

fn detect_parsed(fs: &dyn FileSystem, manifest: &BuildManifest) -> Result<PipelineContext> {
    let context = from_manifest(fs, manifest)?;
    info!(
        manifest = %manifest.path().display(),
        artifacts = context.artifacts.len(),
        languages = context.languages.len(),
        warnings = context.warnings.len(),
        "Pipeline context built"
    );
    Ok(context)
}

pub fn schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(PipelineContext)
}

pub fn schema_json() -> serde_json::Value {
    serde_json::to_value(schema()).unwrap_or(serde_json::Value::Null)
}
