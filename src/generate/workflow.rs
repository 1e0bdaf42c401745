//! `.github/workflows/ci.yml` rendering
//!
//! The skeleton is fixed: push/PR/dispatch triggers, then `lint`, `test`, one
//! `custom-<image>` job per undetected artifact, and `build`. Only the matrix rows,
//! the per-language setup steps and the build parameters vary with the input.

use super::{to_yaml, GeneratedArtifact};
use crate::context::{BuildMatrixEntry, PipelineContext};
use crate::error::{OctopilotError, Result};
use crate::stack::LanguageId;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const WORKFLOW_PATH: &str = ".github/workflows/ci.yml";
pub const DEFAULT_PLATFORMS: &str = "linux/amd64,linux/arm64";
pub const DEFAULT_GOLANGCI_LINT_TIMEOUT: &str = "10m";

const CHECKOUT: &str = "actions/checkout@v4";
const RUNNER: &str = "ubuntu-latest";

const PROMOTE_GATE_PLACEHOLDER: &str = "\
# Promotion gate (placeholder)
# This workflow builds and pushes images only. Promoting a built image between
# environments is a separate, manually approved process and is not generated.
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowOptions {
    /// Target container registry, e.g. `ghcr.io/my-org`
    pub registry: String,
    #[serde(default = "default_platforms")]
    pub platforms: String,
    #[serde(default = "default_lint_timeout")]
    pub golangci_lint_timeout: String,
    /// Append a comment-only promote-gate placeholder after the jobs
    #[serde(default)]
    pub promote_gate_placeholder: bool,
    /// Never honoured; present so that requests asking for promotion are refused
    /// instead of silently dropped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<serde_json::Value>,
}

fn default_platforms() -> String {
    DEFAULT_PLATFORMS.to_string()
}

fn default_lint_timeout() -> String {
    DEFAULT_GOLANGCI_LINT_TIMEOUT.to_string()
}

impl WorkflowOptions {
    pub fn new(registry: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            platforms: default_platforms(),
            golangci_lint_timeout: default_lint_timeout(),
            promote_gate_placeholder: false,
            promotion: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.promotion.is_some() {
            return Err(OctopilotError::UnsupportedOperation(
                "generated workflows never contain a promotion job".to_string(),
            ));
        }
        if self.registry.trim().is_empty() {
            return Err(OctopilotError::InvalidArguments(
                "registry must not be empty".to_string(),
            ));
        }
        if self.platforms.trim().is_empty() {
            return Err(OctopilotError::InvalidArguments(
                "platforms must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn registry_host(&self) -> &str {
        let registry = self.registry.trim();
        registry.split('/').next().unwrap_or(registry)
    }
}

/// Toolchain setup action for a known language
struct SetupAction {
    language: LanguageId,
    uses: &'static str,
    version_input: &'static str,
    /// Used when the matrix row carries no version
    fallback_version: &'static str,
    extra: &'static [(&'static str, &'static str)],
}

fn setup_actions() -> [SetupAction; 5] {
    [
        SetupAction {
            language: LanguageId::Go,
            uses: "actions/setup-go@v5",
            version_input: "go-version",
            fallback_version: "stable",
            extra: &[],
        },
        SetupAction {
            language: LanguageId::Rust,
            uses: "dtolnay/rust-toolchain@master",
            version_input: "toolchain",
            fallback_version: "stable",
            extra: &[],
        },
        SetupAction {
            language: LanguageId::Node,
            uses: "actions/setup-node@v4",
            version_input: "node-version",
            fallback_version: "lts/*",
            extra: &[],
        },
        SetupAction {
            language: LanguageId::Python,
            uses: "actions/setup-python@v5",
            version_input: "python-version",
            fallback_version: "3.x",
            extra: &[],
        },
        SetupAction {
            language: LanguageId::Java,
            uses: "actions/setup-java@v4",
            version_input: "java-version",
            fallback_version: "21",
            extra: &[("distribution", "temurin")],
        },
    ]
}

#[derive(Serialize)]
struct Workflow {
    name: &'static str,
    on: Triggers,
    jobs: IndexMap<String, Job>,
}

#[derive(Serialize)]
struct Triggers {
    push: PushTrigger,
    pull_request: BranchFilter,
    workflow_dispatch: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct PushTrigger {
    branches: Vec<&'static str>,
    tags: Vec<&'static str>,
}

#[derive(Serialize)]
struct BranchFilter {
    branches: Vec<&'static str>,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "kebab-case")]
struct Job {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    needs: Vec<String>,
    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    condition: Option<String>,
    runs_on: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<IndexMap<&'static str, &'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<Strategy>,
    steps: Vec<Step>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct Strategy {
    fail_fast: bool,
    matrix: Matrix,
}

#[derive(Serialize)]
struct Matrix {
    include: Vec<IndexMap<&'static str, String>>,
}

#[derive(Serialize, Default)]
struct Step {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'static str>,
    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    with: Option<IndexMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    env: Option<IndexMap<&'static str, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<String>,
}

impl Step {
    fn uses(uses: &str) -> Self {
        Self {
            uses: Some(uses.to_string()),
            ..Default::default()
        }
    }

    fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn id(mut self, id: &'static str) -> Self {
        self.id = Some(id);
        self
    }

    fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.with
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Values reach the shell as variables, never as script text
    fn env(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(IndexMap::new)
            .insert(key, value.into());
        self
    }

    fn run(run: impl Into<String>) -> Self {
        Self {
            run: Some(run.into()),
            ..Default::default()
        }
    }
}

/// Render the CI workflow for a pipeline context.
pub fn render_ci_workflow(
    context: &PipelineContext,
    options: &WorkflowOptions,
) -> Result<GeneratedArtifact> {
    options.validate()?;
    check_context(context)?;

    let matrix = context.matrix();
    let mut jobs: IndexMap<String, Job> = IndexMap::new();
    let mut build_needs = Vec::new();

    if !matrix.is_empty() {
        let has_go = context.has_language(&LanguageId::Go);
        jobs.insert("lint".to_string(), matrix_job("Lint", &matrix, lint_action(has_go, options)));
        jobs.insert("test".to_string(), matrix_job("Test", &matrix, test_action()));
        build_needs.push("lint".to_string());
        build_needs.push("test".to_string());
    }

    let mut used_ids: HashSet<String> = jobs.keys().cloned().collect();
    used_ids.insert("build".to_string());
    for artifact in context.unknown_artifacts() {
        let id = unique_job_id(&format!("custom-{}", job_id_fragment(&artifact.image)), &used_ids);
        used_ids.insert(id.clone());
        jobs.insert(id.clone(), custom_job(&artifact.image, &artifact.context));
        build_needs.push(id);
    }

    jobs.insert("build".to_string(), build_job(build_needs, options));

    let workflow = Workflow {
        name: "CI",
        on: Triggers {
            push: PushTrigger {
                branches: vec!["main"],
                tags: vec!["v*"],
            },
            pull_request: BranchFilter {
                branches: vec!["main"],
            },
            workflow_dispatch: BTreeMap::new(),
        },
        jobs,
    };

    let mut content = to_yaml(&workflow, "CI workflow")?;
    if options.promote_gate_placeholder {
        content.push('\n');
        content.push_str(PROMOTE_GATE_PLACEHOLDER);
    }

    Ok(GeneratedArtifact {
        path: WORKFLOW_PATH.to_string(),
        content,
    })
}

/// Refuse context values that would be evaluated by the workflow runner.
///
/// Language names land inside `if:` expressions, so they are limited to
/// `[a-z0-9_+-]`. Images and contexts are passed as step environment, where only
/// `${{` still carries meaning.
fn check_context(context: &PipelineContext) -> Result<()> {
    let languages = context
        .languages
        .iter()
        .map(|l| &l.language)
        .chain(context.artifacts.iter().map(|a| &a.language));
    for language in languages {
        if !is_plain_language_name(language.as_str()) {
            return Err(OctopilotError::InvalidArguments(format!(
                "language name {:?} must match [a-z0-9_+-]+",
                language.as_str()
            )));
        }
    }

    for artifact in &context.artifacts {
        for (field, value) in [("image", &artifact.image), ("context", &artifact.context)] {
            if value.contains("${{") {
                return Err(OctopilotError::InvalidArguments(format!(
                    "artifact {} {:?} must not contain a workflow expression",
                    field, value
                )));
            }
        }
    }
    Ok(())
}

fn is_plain_language_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'_' | b'+' | b'-'))
}

fn matrix_job(name: &str, matrix: &[BuildMatrixEntry], action: Step) -> Job {
    let include = matrix
        .iter()
        .map(|row| {
            let mut entry = IndexMap::new();
            entry.insert("language", row.language.as_str().to_string());
            if let Some(version) = &row.version {
                entry.insert("version", version.clone());
            }
            entry
        })
        .collect();

    let mut steps = vec![Step::uses(CHECKOUT)];
    steps.extend(setup_steps(matrix));
    steps.push(action);

    Job {
        name: Some(format!("{} (${{{{ matrix.language }}}})", name)),
        runs_on: RUNNER,
        strategy: Some(Strategy {
            fail_fast: false,
            matrix: Matrix { include },
        }),
        steps,
        ..Default::default()
    }
}

/// One guarded setup step per language present in the matrix
fn setup_steps(matrix: &[BuildMatrixEntry]) -> Vec<Step> {
    let actions = setup_actions();
    let mut seen = HashSet::new();
    let mut steps = Vec::new();

    for row in matrix {
        if !seen.insert(row.language.clone()) {
            continue;
        }
        let condition = format!("matrix.language == '{}'", row.language);

        match actions.iter().find(|a| a.language == row.language) {
            Some(action) => {
                let mut step = Step::uses(action.uses)
                    .named(format!("Set up {}", row.language.name()))
                    .when(condition)
                    .with(
                        action.version_input,
                        format!("${{{{ matrix.version || '{}' }}}}", action.fallback_version),
                    );
                for (key, value) in action.extra {
                    step = step.with(*key, *value);
                }
                steps.push(step);
            }
            None => steps.push(
                Step::run(format!(
                    "echo \"No setup action is known for {}; the runner image must provide its toolchain.\"",
                    row.language
                ))
                .named(format!("Set up {} (custom toolchain)", row.language))
                .when(condition),
            ),
        }
    }
    steps
}

fn lint_action(has_go: bool, options: &WorkflowOptions) -> Step {
    let step = Step::uses("octopilot/actions/lint@main").with("pipeline-context", "${{ toJson(matrix) }}");
    if has_go {
        step.with("golangci-lint-timeout", options.golangci_lint_timeout.trim())
    } else {
        step
    }
}

fn test_action() -> Step {
    Step::uses("octopilot/actions/test@main").with("pipeline-context", "${{ toJson(matrix) }}")
}

fn custom_job(image: &str, context: &str) -> Job {
    Job {
        name: Some(format!("Custom build checks ({})", image)),
        runs_on: RUNNER,
        steps: vec![
            Step::uses(CHECKOUT),
            Step::run(
                "echo \"No language was detected for $IMAGE in $CONTEXT; add lint and test commands for it here.\"",
            )
            .named("Custom toolchain")
            .env("IMAGE", image)
            .env("CONTEXT", context),
        ],
        ..Default::default()
    }
}

fn build_job(needs: Vec<String>, options: &WorkflowOptions) -> Job {
    let mut permissions = IndexMap::new();
    permissions.insert("contents", "read");
    permissions.insert("packages", "write");
    permissions.insert("id-token", "write");
    permissions.insert("attestations", "write");

    Job {
        name: Some("Build and Push Container".to_string()),
        needs,
        condition: Some("github.event_name == 'push'".to_string()),
        runs_on: RUNNER,
        permissions: Some(permissions),
        steps: vec![
            Step::uses(CHECKOUT),
            Step::uses("octopilot/actions/janitor@main").named("Free runner disk space"),
            Step::uses("docker/setup-qemu-action@v3"),
            Step::uses("docker/login-action@v3")
                .with("registry", options.registry_host())
                .with("username", "${{ github.actor }}")
                .with("password", "${{ secrets.GITHUB_TOKEN }}"),
            Step::uses("octopilot/actions/octopilot@main")
                .named("Build and Push")
                .id("push")
                .with("version", "${{ github.ref_name }}")
                .with("registry", options.registry.trim())
                .with("platforms", options.platforms.trim()),
            Step::run(
                "TAG=$(jq -r '.builds[-1].tag' build_result.json)\n\
                 DIGEST=$(echo \"$TAG\" | awk -F'@' '{print $2}')\n\
                 echo \"digest=$DIGEST\" >> \"$GITHUB_OUTPUT\"\n",
            )
            .named("Extract application image digest")
            .id("op-digest"),
            Step::uses("actions/attest-build-provenance@v2")
                .named("Attest Build Provenance")
                .when("startsWith(github.ref, 'refs/tags/v') && steps.op-digest.outputs.digest != ''")
                .with("subject-name", "${{ steps.push.outputs.image || '' }}")
                .with("subject-digest", "${{ steps.op-digest.outputs.digest }}")
                .with("push-to-registry", "true"),
        ],
        ..Default::default()
    }
}

/// Lowercased image name with everything outside `[a-z0-9_-]` replaced by `-`
fn job_id_fragment(image: &str) -> String {
    let fragment: String = image
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = fragment.trim_matches('-');
    if trimmed.is_empty() {
        "artifact".to_string()
    } else {
        trimmed.to_string()
    }
}

fn unique_job_id(candidate: &str, used: &HashSet<String>) -> String {
    if !used.contains(candidate) {
        return candidate.to_string();
    }
    (2..)
        .map(|n| format!("{}-{}", candidate, n))
        .find(|id| !used.contains(id))
        .unwrap_or_else(|| candidate.to_string())
}
