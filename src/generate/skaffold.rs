use super::{to_yaml, GeneratedArtifact};
use crate::error::{OctopilotError, Result};
use crate::manifest::MANIFEST_FILE_NAMES;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_BUILDER: &str = "ghcr.io/octopilot/builder-jammy-base:latest";

const SKAFFOLD_API_VERSION: &str = "skaffold/v4beta1";

/// One artifact to declare in the generated manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactRequest {
    pub name: String,
    pub context: String,
    /// Dockerfile relative to `context`; without one the artifact is built with buildpacks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_file: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub build_args: BTreeMap<String, String>,
}

impl ArtifactRequest {
    pub fn new(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: context.into(),
            docker_file: None,
            build_args: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BuildManifestRequest {
    pub artifacts: Vec<ArtifactRequest>,
    /// Buildpack builder image, defaults to [`DEFAULT_BUILDER`]
    #[serde(default)]
    pub builder: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SkaffoldConfig<'a> {
    api_version: &'static str,
    kind: &'static str,
    build: SkaffoldBuild<'a>,
}

#[derive(Serialize)]
struct SkaffoldBuild<'a> {
    artifacts: Vec<SkaffoldArtifact<'a>>,
}

#[derive(Serialize)]
struct SkaffoldArtifact<'a> {
    image: &'a str,
    context: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    docker: Option<DockerStanza<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buildpacks: Option<BuildpacksStanza<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DockerStanza<'a> {
    dockerfile: &'a str,
    #[serde(skip_serializing_if = "no_build_args")]
    build_args: &'a BTreeMap<String, String>,
}

fn no_build_args(args: &&BTreeMap<String, String>) -> bool {
    args.is_empty()
}

#[derive(Serialize)]
struct BuildpacksStanza<'a> {
    builder: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env: Vec<String>,
}

/// Render `skaffold.yaml` for an explicit artifact list.
pub fn render_build_manifest(request: &BuildManifestRequest) -> Result<GeneratedArtifact> {
    validate(request)?;

    let builder = request
        .builder
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(DEFAULT_BUILDER);

    let artifacts = request
        .artifacts
        .iter()
        .map(|artifact| {
            let docker_file = artifact
                .docker_file
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty());
            match docker_file {
                Some(dockerfile) => SkaffoldArtifact {
                    image: artifact.name.trim(),
                    context: artifact.context.trim(),
                    docker: Some(DockerStanza {
                        dockerfile,
                        build_args: &artifact.build_args,
                    }),
                    buildpacks: None,
                },
                None => SkaffoldArtifact {
                    image: artifact.name.trim(),
                    context: artifact.context.trim(),
                    docker: None,
                    buildpacks: Some(BuildpacksStanza {
                        builder,
                        env: artifact
                            .build_args
                            .iter()
                            .map(|(k, v)| format!("{}={}", k, v))
                            .collect(),
                    }),
                },
            }
        })
        .collect();

    let config = SkaffoldConfig {
        api_version: SKAFFOLD_API_VERSION,
        kind: "Config",
        build: SkaffoldBuild { artifacts },
    };

    Ok(GeneratedArtifact {
        path: MANIFEST_FILE_NAMES[0].to_string(),
        content: to_yaml(&config, "skaffold.yaml")?,
    })
}

fn validate(request: &BuildManifestRequest) -> Result<()> {
    if request.artifacts.is_empty() {
        return Err(OctopilotError::ManifestInvalid(
            "at least one artifact is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for (index, artifact) in request.artifacts.iter().enumerate() {
        let name = artifact.name.trim();
        if name.is_empty() {
            return Err(OctopilotError::ManifestInvalid(format!(
                "artifact #{} has a blank name",
                index
            )));
        }
        if artifact.context.trim().is_empty() {
            return Err(OctopilotError::ManifestInvalid(format!(
                "artifact '{}' has a blank context",
                name
            )));
        }
        if !seen.insert(name) {
            return Err(OctopilotError::ManifestInvalid(format!(
                "artifact '{}' is declared more than once",
                name
            )));
        }
    }
    Ok(())
}
