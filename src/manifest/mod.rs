//! Build manifest (`skaffold.yaml`) loading and validation
//!
//! Only the parts of the Skaffold document that drive detection are decoded:
//! `build.artifacts[].image`, `.context` and `.docker.dockerfile`. Every other key
//! is ignored so real-world manifests with deploy/profile sections still parse.
//!
//! Artifact contexts are resolved against the manifest's own directory, never the
//! process working directory.

use crate::error::{OctopilotError, Result};
use crate::fs::FileSystem;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File names probed, in order, when a workspace directory is given instead of a manifest
pub const MANIFEST_FILE_NAMES: &[&str] = &["skaffold.yaml", "skaffold.yml"];

/// One buildable artifact declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSpec {
    /// Image name, unique within the manifest
    pub image: String,
    /// Context exactly as written in the manifest
    pub context: String,
    /// Context resolved against the manifest directory
    pub context_dir: PathBuf,
    /// Dockerfile relative to the context, when the artifact builds from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_file: Option<PathBuf>,
}

/// Parsed, validated manifest. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildManifest {
    path: PathBuf,
    artifacts: Vec<ArtifactSpec>,
}

impl BuildManifest {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory every artifact context is resolved against
    pub fn base_dir(&self) -> &Path {
        base_dir_of(&self.path)
    }

    pub fn artifacts(&self) -> &[ArtifactSpec] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    build: Option<RawBuild>,
}

#[derive(Debug, Deserialize)]
struct RawBuild {
    #[serde(default)]
    artifacts: Option<Vec<RawArtifact>>,
}

#[derive(Debug, Deserialize)]
struct RawArtifact {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    docker: Option<RawDocker>,
}

#[derive(Debug, Deserialize)]
struct RawDocker {
    #[serde(default)]
    dockerfile: Option<String>,
}

/// Load and validate the manifest at `manifest_path`.
pub fn parse(fs: &dyn FileSystem, manifest_path: &Path) -> Result<BuildManifest> {
    if !fs.is_file(manifest_path) {
        return Err(OctopilotError::ManifestNotFound(manifest_path.to_path_buf()));
    }

    let content = fs.read_to_string(manifest_path).map_err(|e| {
        OctopilotError::ManifestInvalid(format!(
            "{} could not be read: {:#}",
            manifest_path.display(),
            e
        ))
    })?;

    parse_str(fs, &content, manifest_path)
}

/// Locate the manifest inside `workspace` and parse it.
pub fn parse_workspace(fs: &dyn FileSystem, workspace: &Path) -> Result<BuildManifest> {
    let manifest_path = find_manifest(fs, workspace)
        .ok_or_else(|| OctopilotError::ManifestNotFound(workspace.join(MANIFEST_FILE_NAMES[0])))?;
    parse(fs, &manifest_path)
}

/// Path of the first manifest file present in `workspace`
pub fn find_manifest(fs: &dyn FileSystem, workspace: &Path) -> Option<PathBuf> {
    MANIFEST_FILE_NAMES
        .iter()
        .map(|name| workspace.join(name))
        .find(|candidate| fs.is_file(candidate))
}

/// Parse already-loaded manifest text as if it lived at `manifest_path`.
pub fn parse_str(fs: &dyn FileSystem, content: &str, manifest_path: &Path) -> Result<BuildManifest> {
    let raw: RawManifest = serde_yaml::from_str(content).map_err(|e| {
        OctopilotError::ManifestInvalid(format!(
            "{} is not a valid manifest document: {}",
            manifest_path.display(),
            e
        ))
    })?;

    let raw_artifacts = raw
        .build
        .and_then(|b| b.artifacts)
        .ok_or_else(|| {
            OctopilotError::ManifestInvalid(format!(
                "{} has no build.artifacts list",
                manifest_path.display()
            ))
        })?;

    if raw_artifacts.is_empty() {
        return Err(OctopilotError::ManifestInvalid(format!(
            "{} declares no artifacts",
            manifest_path.display()
        )));
    }

    let base_dir = base_dir_of(manifest_path);
    let mut seen = HashSet::new();
    let mut artifacts = Vec::with_capacity(raw_artifacts.len());

    for (index, raw) in raw_artifacts.into_iter().enumerate() {
        let artifact = validate_artifact(fs, base_dir, index, raw)?;
        if !seen.insert(artifact.image.clone()) {
            return Err(OctopilotError::ManifestInvalid(format!(
                "artifact #{} reuses image name '{}'",
                index, artifact.image
            )));
        }
        debug!(
            image = %artifact.image,
            context = %artifact.context_dir.display(),
            "Parsed artifact"
        );
        artifacts.push(artifact);
    }

    Ok(BuildManifest {
        path: manifest_path.to_path_buf(),
        artifacts,
    })
}

fn validate_artifact(
    fs: &dyn FileSystem,
    base_dir: &Path,
    index: usize,
    raw: RawArtifact,
) -> Result<ArtifactSpec> {
    let image = raw
        .image
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .ok_or_else(|| {
            OctopilotError::ManifestInvalid(format!(
                "artifact #{} is missing required field 'image'",
                index
            ))
        })?;

    let context = raw
        .context
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            OctopilotError::ManifestInvalid(format!(
                "artifact '{}' is missing required field 'context'",
                image
            ))
        })?;

    let context_dir = base_dir.join(&context);
    if !fs.is_dir(&context_dir) {
        return Err(OctopilotError::ManifestInvalid(format!(
            "artifact '{}' context '{}' does not exist (resolved to {})",
            image,
            context,
            context_dir.display()
        )));
    }

    let docker_file = raw
        .docker
        .and_then(|d| d.dockerfile)
        .filter(|f| !f.trim().is_empty())
        .map(PathBuf::from);

    Ok(ArtifactSpec {
        image,
        context,
        context_dir,
        docker_file,
    })
}

fn base_dir_of(manifest_path: &Path) -> &Path {
    match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
