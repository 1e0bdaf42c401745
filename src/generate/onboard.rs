use super::{
    render_build_manifest, render_ci_workflow, ArtifactRequest, BuildManifestRequest,
    GeneratedArtifact, WorkflowOptions, WORKFLOW_PATH,
};
use crate::context::{self, PipelineContext};
use crate::detection;
use crate::error::{OctopilotError, Result};
use crate::fs::FileSystem;
use crate::manifest::{self, MANIFEST_FILE_NAMES};
use crate::stack::LanguageId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OnboardOptions {
    #[serde(flatten)]
    pub workflow: WorkflowOptions,
    /// Builder for a generated manifest; ignored when the workspace already has one
    #[serde(default)]
    pub builder: Option<String>,
}

/// Files an onboarding run proposes, plus follow-up advice
#[derive(Debug, Clone, Serialize)]
pub struct OnboardPlan {
    pub pipeline_context: PipelineContext,
    /// `None` when the workspace already has a manifest
    pub skaffold_yaml: Option<GeneratedArtifact>,
    pub ci_workflow: GeneratedArtifact,
    /// Paths that do not exist yet and would be written
    pub files_to_create: Vec<String>,
    pub next_steps: Vec<String>,
}

/// Detect a repository and propose the files needed to put it on the pipeline.
///
/// A missing `skaffold.yaml` is generated from the immediate subdirectories that
/// carry a language marker, or from the workspace itself when none do. The proposed
/// manifest is parsed in memory; nothing is written.
pub fn onboard(fs: &dyn FileSystem, workspace: &Path, options: &OnboardOptions) -> Result<OnboardPlan> {
    if !fs.is_dir(workspace) {
        return Err(OctopilotError::InvalidArguments(format!(
            "{} is not a directory",
            workspace.display()
        )));
    }

    let (pipeline_context, skaffold_yaml) = match manifest::find_manifest(fs, workspace) {
        Some(path) => {
            debug!(manifest = %path.display(), "Using existing manifest");
            (context::detect_project_contexts(fs, &path)?, None)
        }
        None => {
            let request = BuildManifestRequest {
                artifacts: discover_artifacts(fs, workspace)?,
                builder: options.builder.clone(),
            };
            let generated = render_build_manifest(&request)?;
            let manifest_path = workspace.join(MANIFEST_FILE_NAMES[0]);
            let parsed = manifest::parse_str(fs, &generated.content, &manifest_path)?;
            (context::from_manifest(fs, &parsed)?, Some(generated))
        }
    };

    let ci_workflow = render_ci_workflow(&pipeline_context, &options.workflow)?;

    let mut files_to_create = Vec::new();
    if let Some(generated) = &skaffold_yaml {
        files_to_create.push(generated.path.clone());
    }
    if !fs.exists(&workspace.join(WORKFLOW_PATH)) {
        files_to_create.push(ci_workflow.path.clone());
    }

    let next_steps = next_steps(fs, workspace, &pipeline_context, &options.workflow);

    info!(
        workspace = %workspace.display(),
        artifacts = pipeline_context.artifacts.len(),
        files = files_to_create.len(),
        "Onboarding plan ready"
    );

    Ok(OnboardPlan {
        pipeline_context,
        skaffold_yaml,
        ci_workflow,
        files_to_create,
        next_steps,
    })
}

fn discover_artifacts(fs: &dyn FileSystem, workspace: &Path) -> Result<Vec<ArtifactRequest>> {
    let entries = fs
        .read_dir(workspace)
        .map_err(|e| OctopilotError::InvalidArguments(format!("{:#}", e)))?;

    let artifacts: Vec<ArtifactRequest> = entries
        .iter()
        .filter(|entry| entry.is_dir() && !entry.file_name().starts_with('.'))
        .filter(|entry| {
            detection::probes()
                .iter()
                .any(|probe| probe.matching_marker(fs, entry.path()).is_some())
        })
        .map(|entry| ArtifactRequest::new(entry.file_name(), entry.file_name()))
        .collect();

    if !artifacts.is_empty() {
        debug!(count = artifacts.len(), "Discovered service directories");
        return Ok(artifacts);
    }

    let name = workspace
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "app".to_string());
    Ok(vec![ArtifactRequest::new(name, ".")])
}

fn next_steps(
    fs: &dyn FileSystem,
    workspace: &Path,
    context: &PipelineContext,
    options: &WorkflowOptions,
) -> Vec<String> {
    let mut steps = vec![
        "Ensure GITHUB_TOKEN has 'packages: write' and 'attestations: write' permissions.".to_string(),
        format!("Log in to {} from CI (docker/login-action@v3).", options.registry.trim()),
    ];
    if context.has_language(&LanguageId::Go) {
        steps.push("Add .golangci.yml with 'run: timeout: 10m' for large vendor trees.".to_string());
    }
    if context.unknown_artifacts().next().is_some() {
        steps.push("Fill in the custom-* jobs for artifacts whose language was not detected.".to_string());
    }
    if !fs.exists(&workspace.join(".pre-commit-config.yaml")) {
        steps.push("Add .pre-commit-config.yaml for the lint job to run hooks.".to_string());
    }
    steps.push("Push changes; the CI pipeline runs on the next push to main.".to_string());
    steps
}
