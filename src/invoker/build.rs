use super::{BuildInvocationResult, ExecutionMode, OpInvoker};
use crate::error::{OctopilotError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// File `op build` leaves in the workspace describing what it pushed
pub const BUILD_RESULT_FILE: &str = "build_result.json";
pub const DEFAULT_BUILD_PLATFORMS: &str = "linux/amd64";

fn default_platforms() -> String {
    DEFAULT_BUILD_PLATFORMS.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OpBuildRequest {
    /// Repository root containing `skaffold.yaml`
    pub workspace: PathBuf,
    /// Target registry, e.g. `ghcr.io/my-org`
    pub registry: String,
    #[serde(default = "default_platforms")]
    pub platforms: String,
    #[serde(default)]
    pub push: bool,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub mode_hint: Option<ExecutionMode>,
    /// Seconds before the build is killed
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl OpBuildRequest {
    pub fn new(workspace: impl Into<PathBuf>, registry: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            registry: registry.into(),
            platforms: default_platforms(),
            push: false,
            extra_args: Vec::new(),
            mode_hint: None,
            timeout: None,
        }
    }

    /// `build --repo <registry> --platform <platforms> [--push] [extra...]`
    pub fn to_args(&self) -> Result<Vec<String>> {
        let registry = self.registry.trim();
        if registry.is_empty() {
            return Err(OctopilotError::InvalidArguments(
                "registry must not be empty".to_string(),
            ));
        }
        let platforms = self.platforms.trim();
        if platforms.is_empty() {
            return Err(OctopilotError::InvalidArguments(
                "platforms must not be empty".to_string(),
            ));
        }

        let mut args = vec![
            "build".to_string(),
            "--repo".to_string(),
            registry.to_string(),
            "--platform".to_string(),
            platforms.to_string(),
        ];
        if self.push {
            args.push("--push".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        Ok(args)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpBuildOutcome {
    pub invocation: BuildInvocationResult,
    /// Contents of `build_result.json`, when the build succeeded and wrote one
    pub build_result: Option<serde_json::Value>,
}

impl OpInvoker {
    /// Run `op build` for a workspace and collect its result file.
    pub async fn run_build(&self, request: &OpBuildRequest) -> Result<OpBuildOutcome> {
        let args = request.to_args()?;
        let timeout = match request.timeout {
            Some(0) => {
                return Err(OctopilotError::InvalidArguments(
                    "timeout must be at least 1 second".to_string(),
                ))
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => self.config.default_timeout,
        };

        let invocation = self
            .invoke_with_timeout(&request.workspace, &args, request.mode_hint, timeout)
            .await?;

        let build_result = if invocation.success() {
            read_build_result(&request.workspace.join(BUILD_RESULT_FILE)).await
        } else {
            None
        };

        Ok(OpBuildOutcome {
            invocation,
            build_result,
        })
    }
}

async fn read_build_result(path: &std::path::Path) -> Option<serde_json::Value> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No build result file");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Build result file is not valid JSON");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::testing::{FakeEnvironment, RecordingRunner};
    use crate::invoker::InvokerConfig;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn invoker_for(workspace: &std::path::Path, runner: Arc<RecordingRunner>) -> OpInvoker {
        let env = FakeEnvironment::with_dir(workspace.to_str().unwrap())
            .executable("op", "/usr/local/bin/op");
        OpInvoker::with_parts(InvokerConfig::default(), Arc::new(env), runner)
    }

    #[test]
    fn test_args_mapping() {
        let mut request = OpBuildRequest::new("/repo", "ghcr.io/acme");
        request.platforms = "linux/amd64,linux/arm64".to_string();
        request.push = true;
        request.extra_args = vec!["--sbom".to_string()];

        assert_eq!(
            request.to_args().unwrap(),
            vec!["build", "--repo", "ghcr.io/acme", "--platform", "linux/amd64,linux/arm64", "--push", "--sbom"]
        );
    }

    #[test]
    fn test_blank_registry_rejected() {
        let request = OpBuildRequest::new("/repo", " ");
        assert!(matches!(request.to_args(), Err(OctopilotError::InvalidArguments(_))));
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: OpBuildRequest =
            serde_json::from_str(r#"{"workspace": "/repo", "registry": "ghcr.io/acme"}"#).unwrap();
        assert_eq!(request.platforms, DEFAULT_BUILD_PLATFORMS);
        assert!(!request.push);
        assert_eq!(request.mode_hint, None);
    }

    #[tokio::test]
    async fn test_promote_flag_in_extra_args_rejected() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::exiting(0, ""));
        let invoker = invoker_for(temp.path(), runner.clone());

        let mut request = OpBuildRequest::new(temp.path(), "ghcr.io/acme");
        request.extra_args = vec!["--promote-to".to_string(), "prod".to_string()];

        let err = invoker.run_build(&request).await.unwrap_err();
        assert!(matches!(err, OctopilotError::ForbiddenOperation(_)));
        assert_eq!(runner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_reads_build_result_after_success() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(BUILD_RESULT_FILE),
            r#"{"builds": [{"imageName": "api", "tag": "ghcr.io/acme/api:1@sha256:abc"}]}"#,
        )
        .unwrap();
        let runner = Arc::new(RecordingRunner::exiting(0, "built"));
        let invoker = invoker_for(temp.path(), runner.clone());

        let outcome = invoker
            .run_build(&OpBuildRequest::new(temp.path(), "ghcr.io/acme"))
            .await
            .unwrap();

        assert_eq!(outcome.invocation.mode, ExecutionMode::Binary);
        assert_eq!(
            outcome.build_result.unwrap()["builds"][0]["imageName"],
            serde_json::json!("api")
        );
        assert_eq!(runner.last().args[0], "build");
    }

    #[tokio::test]
    async fn test_no_build_result_on_failure() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(BUILD_RESULT_FILE), "{}").unwrap();
        let runner = Arc::new(RecordingRunner::exiting(1, ""));
        let invoker = invoker_for(temp.path(), runner);

        let outcome = invoker
            .run_build(&OpBuildRequest::new(temp.path(), "ghcr.io/acme"))
            .await
            .unwrap();

        assert_eq!(outcome.invocation.exit_code, 1);
        assert!(outcome.build_result.is_none());
    }

    #[tokio::test]
    async fn test_zero_timeout_rejected() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::exiting(0, ""));
        let invoker = invoker_for(temp.path(), runner.clone());

        let mut request = OpBuildRequest::new(temp.path(), "ghcr.io/acme");
        request.timeout = Some(0);

        let err = invoker.run_build(&request).await.unwrap_err();
        assert!(matches!(err, OctopilotError::InvalidArguments(_)));
        assert_eq!(runner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_build_result_is_none() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(RecordingRunner::exiting(0, ""));
        let invoker = invoker_for(temp.path(), runner);

        let outcome = invoker
            .run_build(&OpBuildRequest::new(temp.path(), "ghcr.io/acme"))
            .await
            .unwrap();
        assert!(outcome.build_result.is_none());
    }
}
