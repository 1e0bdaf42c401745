use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::trait_def::Tool;
use crate::context::{self, PipelineContext};
use crate::error::{OctopilotError, Result};
use crate::fs::FileSystem;
use crate::generate::{
    self, render_build_manifest, render_ci_workflow, BuildManifestRequest, OnboardOptions,
    WorkflowOptions,
};
use crate::invoker::{ExecutionMode, OpBuildRequest, OpInvoker};

fn decode<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    // A missing arguments object reads as `{}` so that required fields are reported by name
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| OctopilotError::InvalidArguments(format!("{}: {}", tool, e)))
}

fn encode<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| OctopilotError::InvalidArguments(format!("Failed to encode result: {}", e)))
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WorkspaceArgs {
    /// Absolute path to the repository root
    workspace: PathBuf,
}

pub struct DetectProjectContextsTool {
    fs: Arc<dyn FileSystem>,
}

impl DetectProjectContextsTool {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for DetectProjectContextsTool {
    fn name(&self) -> &'static str {
        "detect_project_contexts"
    }

    fn description(&self) -> &'static str {
        "Parse skaffold.yaml in the workspace and return the pipeline context: detected \
         languages, versions and per-artifact results. Artifacts whose language cannot be \
         determined are reported as 'unknown' with a warning instead of failing the call."
    }

    fn schema(&self) -> Value {
        schema_of::<WorkspaceArgs>()
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        let args: WorkspaceArgs = decode(self.name(), arguments)?;
        let context = context::detect_workspace(self.fs.as_ref(), &args.workspace)?;
        encode(&context)
    }
}

pub struct GenerateSkaffoldYamlTool {
    default_builder: String,
}

impl GenerateSkaffoldYamlTool {
    pub fn new(default_builder: impl Into<String>) -> Self {
        Self {
            default_builder: default_builder.into(),
        }
    }
}

#[async_trait]
impl Tool for GenerateSkaffoldYamlTool {
    fn name(&self) -> &'static str {
        "generate_skaffold_yaml"
    }

    fn description(&self) -> &'static str {
        "Render a skaffold.yaml declaring the given artifacts. Each artifact needs an image \
         'name' and a source 'context'; artifacts without a 'docker_file' are built with \
         Cloud Native Buildpacks. Returns the file path and content; nothing is written."
    }

    fn schema(&self) -> Value {
        schema_of::<BuildManifestRequest>()
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        generate::reject_promotion_args(&arguments)?;
        let mut request: BuildManifestRequest = decode(self.name(), arguments)?;
        if request.builder.is_none() {
            request.builder = Some(self.default_builder.clone());
        }
        encode(&render_build_manifest(&request)?)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GenerateCiWorkflowArgs {
    /// Output of detect_project_contexts
    pipeline_context: PipelineContext,
    #[serde(flatten)]
    options: WorkflowOptions,
}

pub struct GenerateCiWorkflowTool;

#[async_trait]
impl Tool for GenerateCiWorkflowTool {
    fn name(&self) -> &'static str {
        "generate_ci_workflow"
    }

    fn description(&self) -> &'static str {
        "Render .github/workflows/ci.yml from a pipeline context: lint and test matrix jobs \
         per detected language, a generic job per undetected artifact, then the container \
         build. The workflow never contains a promotion job and requests for one are refused."
    }

    fn schema(&self) -> Value {
        schema_of::<GenerateCiWorkflowArgs>()
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        generate::reject_promotion_args(&arguments)?;
        let args: GenerateCiWorkflowArgs = decode(self.name(), arguments)?;
        encode(&render_ci_workflow(&args.pipeline_context, &args.options)?)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct OnboardRepositoryArgs {
    /// Absolute path to the repository root
    workspace: PathBuf,
    #[serde(flatten)]
    options: OnboardOptions,
}

pub struct OnboardRepositoryTool {
    fs: Arc<dyn FileSystem>,
    default_builder: String,
}

impl OnboardRepositoryTool {
    pub fn new(fs: Arc<dyn FileSystem>, default_builder: impl Into<String>) -> Self {
        Self {
            fs,
            default_builder: default_builder.into(),
        }
    }
}

#[async_trait]
impl Tool for OnboardRepositoryTool {
    fn name(&self) -> &'static str {
        "onboard_repository"
    }

    fn description(&self) -> &'static str {
        "Detect a repository and propose everything needed to put it on the pipeline in one \
         call: skaffold.yaml when missing, the CI workflow, the files that would be created \
         and a checklist of manual next steps."
    }

    fn schema(&self) -> Value {
        schema_of::<OnboardRepositoryArgs>()
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        generate::reject_promotion_args(&arguments)?;
        let mut args: OnboardRepositoryArgs = decode(self.name(), arguments)?;
        if args.options.builder.is_none() {
            args.options.builder = Some(self.default_builder.clone());
        }
        let plan = generate::onboard(self.fs.as_ref(), &args.workspace, &args.options)?;
        encode(&plan)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RunOpBuildArgs {
    #[serde(flatten)]
    request: OpBuildRequest,
    /// Shorthand for mode_hint: true selects container, false selects binary
    #[serde(default)]
    use_container: Option<bool>,
}

pub struct RunOpBuildTool {
    invoker: Arc<OpInvoker>,
}

impl RunOpBuildTool {
    pub fn new(invoker: Arc<OpInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl Tool for RunOpBuildTool {
    fn name(&self) -> &'static str {
        "run_op_build"
    }

    fn description(&self) -> &'static str {
        "Run `op build` in the workspace, with a local op binary or inside the op container \
         image. A non-zero exit is returned as data with the captured output. Promotion \
         verbs and flags are refused before anything is spawned."
    }

    fn schema(&self) -> Value {
        schema_of::<RunOpBuildArgs>()
    }

    async fn execute(&self, arguments: Value) -> Result<Value> {
        let args: RunOpBuildArgs = decode(self.name(), arguments)?;
        let mut request = args.request;
        if request.mode_hint.is_none() {
            request.mode_hint = args.use_container.map(|container| {
                if container {
                    ExecutionMode::Container
                } else {
                    ExecutionMode::Binary
                }
            });
        }
        debug!(workspace = %request.workspace.display(), mode_hint = ?request.mode_hint, "Running op build");
        encode(&self.invoker.run_build(&request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use crate::invoker::testing::{FakeEnvironment, RecordingRunner};
    use crate::invoker::InvokerConfig;
    use serde_json::json;

    fn mock_repo() -> Arc<MockFileSystem> {
        let fs = MockFileSystem::new();
        fs.add_file("/mock/repo/api/go.mod", "module api\n\ngo 1.22\n");
        fs.add_dir("/mock/repo/assets");
        fs.add_file(
            "/mock/repo/skaffold.yaml",
            "build:\n  artifacts:\n    - image: api\n      context: api\n    - image: assets\n      context: assets\n",
        );
        Arc::new(fs)
    }

    #[tokio::test]
    async fn test_detect_tool() {
        let tool = DetectProjectContextsTool::new(mock_repo());

        let result = tool.execute(json!({"workspace": "/mock/repo"})).await.unwrap();

        assert_eq!(result["languages"], json!([{"language": "go", "version": "1.22"}]));
        assert_eq!(result["artifacts"][1]["language"], json!("unknown"));
        assert_eq!(result["artifacts"][1]["version"], Value::Null);
        assert_eq!(result["warnings"][0]["kind"], json!("undetected"));
    }

    #[tokio::test]
    async fn test_detect_tool_requires_workspace() {
        let tool = DetectProjectContextsTool::new(mock_repo());
        let err = tool.execute(Value::Null).await.unwrap_err();
        assert!(matches!(err, OctopilotError::InvalidArguments(ref m) if m.contains("workspace")));
    }

    #[tokio::test]
    async fn test_skaffold_tool_uses_configured_builder() {
        let tool = GenerateSkaffoldYamlTool::new("example.com/builder:1");

        let result = tool
            .execute(json!({"artifacts": [{"name": "api", "context": "api"}]}))
            .await
            .unwrap();

        assert_eq!(result["path"], json!("skaffold.yaml"));
        assert!(result["content"].as_str().unwrap().contains("example.com/builder:1"));
    }

    #[tokio::test]
    async fn test_workflow_tool_accepts_minimal_context() {
        let result = GenerateCiWorkflowTool
            .execute(json!({
                "pipeline_context": {
                    "languages": [{"language": "go", "version": "1.22"}],
                    "artifacts": [{"image": "api", "language": "go", "version": "1.22"}]
                },
                "registry": "ghcr.io/acme"
            }))
            .await
            .unwrap();

        let content = result["content"].as_str().unwrap();
        assert!(content.contains("golangci-lint-timeout"));
        assert!(!content.contains("promote:"));
    }

    #[tokio::test]
    async fn test_workflow_tool_refuses_promotion() {
        let err = GenerateCiWorkflowTool
            .execute(json!({
                "pipeline_context": {"languages": [], "artifacts": []},
                "registry": "ghcr.io/acme",
                "promote_to": "prod"
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, OctopilotError::UnsupportedOperation(_)));
    }

    #[tokio::test]
    async fn test_onboard_tool() {
        let tool = OnboardRepositoryTool::new(mock_repo(), "example.com/builder:1");

        let plan = tool
            .execute(json!({"workspace": "/mock/repo", "registry": "ghcr.io/acme"}))
            .await
            .unwrap();

        assert_eq!(plan["skaffold_yaml"], Value::Null);
        assert_eq!(plan["ci_workflow"]["path"], json!(".github/workflows/ci.yml"));
    }

    #[tokio::test]
    async fn test_run_build_tool_maps_use_container() {
        let runner = Arc::new(RecordingRunner::exiting(0, ""));
        let env = FakeEnvironment::with_dir("/work")
            .executable("op", "/usr/local/bin/op")
            .executable("docker", "/usr/bin/docker");
        let invoker = OpInvoker::with_parts(InvokerConfig::default(), Arc::new(env), runner.clone());
        let tool = RunOpBuildTool::new(Arc::new(invoker));

        let result = tool
            .execute(json!({"workspace": "/work", "registry": "ghcr.io/acme", "use_container": true}))
            .await
            .unwrap();

        assert_eq!(result["invocation"]["mode"], json!("container"));
        assert_eq!(runner.last().program, PathBuf::from("/usr/bin/docker"));
    }

    #[tokio::test]
    async fn test_run_build_tool_refuses_promote_flag() {
        let runner = Arc::new(RecordingRunner::exiting(0, ""));
        let env = FakeEnvironment::with_dir("/work").executable("op", "/usr/local/bin/op");
        let invoker = OpInvoker::with_parts(InvokerConfig::default(), Arc::new(env), runner.clone());
        let tool = RunOpBuildTool::new(Arc::new(invoker));

        let err = tool
            .execute(json!({"workspace": "/work", "registry": "r", "extra_args": ["--promote"]}))
            .await
            .unwrap_err();

        assert!(matches!(err, OctopilotError::ForbiddenOperation(_)));
        assert_eq!(runner.spawn_count(), 0);
    }

    #[test]
    fn test_schemas_are_objects() {
        let fs: Arc<dyn FileSystem> = mock_repo();
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(DetectProjectContextsTool::new(fs.clone())),
            Box::new(GenerateSkaffoldYamlTool::new("b")),
            Box::new(GenerateCiWorkflowTool),
            Box::new(OnboardRepositoryTool::new(fs, "b")),
        ];
        for tool in tools {
            assert_eq!(tool.schema()["type"], json!("object"), "{}", tool.name());
        }
    }
}
