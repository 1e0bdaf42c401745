//! Running `op` as a local binary or inside its container image
//!
//! Every invocation goes through three stages, and only the last one touches a
//! process:
//!
//! 1. the argument list is checked against the verb policy ([`ALLOWED_VERBS`]
//!    only, promotion never);
//! 2. a pre-flight resolves the execution mode from the configuration, the
//!    caller's hint, and what the environment actually provides;
//! 3. the command is spawned through a [`ProcessRunner`] and its output captured.
//!
//! A non-zero exit status is a normal [`BuildInvocationResult`], not an error.

mod build;
mod command;
mod environment;
mod runner;

pub use build::{OpBuildOutcome, OpBuildRequest, BUILD_RESULT_FILE, DEFAULT_BUILD_PLATFORMS};
pub use command::{validate_args, ALLOWED_VERBS};
pub use environment::{EnvironmentProbe, SystemEnvironment};
pub use runner::{CommandSpec, ProcessOutput, ProcessRunner, TokioProcessRunner};

use crate::error::{OctopilotError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Container image used when `OP_IMAGE` is not set
pub const DEFAULT_OP_IMAGE: &str = "ghcr.io/octopilot/op:v1.0.0";
/// Executable looked up on `PATH` when no binary path is configured
pub const OP_BINARY_NAME: &str = "op";
pub const CONTAINER_RUNTIME: &str = "docker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Binary,
    Container,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Binary => "binary",
            ExecutionMode::Container => "container",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerConfig {
    /// Explicit `op` binary; when it is not a file, `op` is looked up on `PATH`
    pub binary_path: Option<PathBuf>,
    pub image_ref: String,
    /// Forces a mode for every invocation unless the caller hints otherwise
    pub mode_override: Option<ExecutionMode>,
    /// Applied when an invocation does not carry its own timeout
    pub default_timeout: Option<Duration>,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            image_ref: DEFAULT_OP_IMAGE.to_string(),
            mode_override: None,
            default_timeout: None,
        }
    }
}

/// Where a command will run, decided before anything is spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    Binary { path: PathBuf },
    Container { runtime: PathBuf, image: String },
}

impl ExecutionTarget {
    pub fn mode(&self) -> ExecutionMode {
        match self {
            ExecutionTarget::Binary { .. } => ExecutionMode::Binary,
            ExecutionTarget::Container { .. } => ExecutionMode::Container,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BuildInvocationResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub command_used: String,
    pub mode: ExecutionMode,
}

impl BuildInvocationResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub struct OpInvoker {
    config: InvokerConfig,
    environment: Arc<dyn EnvironmentProbe>,
    runner: Arc<dyn ProcessRunner>,
}

impl OpInvoker {
    /// Invoker backed by the real `PATH` and tokio subprocesses
    pub fn new(config: InvokerConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(SystemEnvironment::new()),
            Arc::new(TokioProcessRunner::new()),
        )
    }

    pub fn with_parts(
        config: InvokerConfig,
        environment: Arc<dyn EnvironmentProbe>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            config,
            environment,
            runner,
        }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Pre-flight: decide where a command would run.
    ///
    /// An explicitly requested mode is honoured or refused, never swapped for the
    /// other one.
    pub fn resolve(&self, mode_hint: Option<ExecutionMode>) -> Result<ExecutionTarget> {
        let requested = mode_hint.or(self.config.mode_override);
        debug!(?requested, "Resolving execution mode");

        match requested {
            Some(ExecutionMode::Binary) => self.binary_target().ok_or_else(|| {
                OctopilotError::ExecutionEnvironmentUnavailable(format!(
                    "binary mode requested but no '{}' executable was found{}",
                    OP_BINARY_NAME,
                    self.binary_hint()
                ))
            }),
            Some(ExecutionMode::Container) => self.container_target().ok_or_else(|| {
                OctopilotError::ExecutionEnvironmentUnavailable(format!(
                    "container mode requested but '{}' was not found on PATH",
                    CONTAINER_RUNTIME
                ))
            }),
            None => self
                .binary_target()
                .or_else(|| self.container_target())
                .ok_or_else(|| {
                    OctopilotError::ExecutionEnvironmentUnavailable(format!(
                        "neither an '{}' executable{} nor '{}' is available; install op or a container runtime",
                        OP_BINARY_NAME,
                        self.binary_hint(),
                        CONTAINER_RUNTIME
                    ))
                }),
        }
    }

    fn binary_target(&self) -> Option<ExecutionTarget> {
        self.config
            .binary_path
            .as_ref()
            .filter(|path| self.environment.is_file(path))
            .cloned()
            .or_else(|| self.environment.find_executable(OP_BINARY_NAME))
            .map(|path| ExecutionTarget::Binary { path })
    }

    fn container_target(&self) -> Option<ExecutionTarget> {
        self.environment
            .find_executable(CONTAINER_RUNTIME)
            .map(|runtime| ExecutionTarget::Container {
                runtime,
                image: self.config.image_ref.clone(),
            })
    }

    fn binary_hint(&self) -> String {
        match &self.config.binary_path {
            Some(path) => format!(" (configured {} is not a file)", path.display()),
            None => String::new(),
        }
    }

    /// Validate, resolve and build the command without running it.
    ///
    /// The context directory is made absolute first, so a relative workspace is
    /// bind-mounted rather than read by the runtime as a named volume.
    pub fn prepare(
        &self,
        context_dir: &Path,
        args: &[String],
        mode_hint: Option<ExecutionMode>,
    ) -> Result<(ExecutionTarget, CommandSpec)> {
        validate_args(args)?;

        if !self.environment.is_dir(context_dir) {
            return Err(OctopilotError::InvalidArguments(format!(
                "artifact context {} is not a directory",
                context_dir.display()
            )));
        }

        let context_dir = self.environment.canonicalize(context_dir).map_err(|e| {
            OctopilotError::InvalidArguments(format!(
                "cannot resolve artifact context {}: {}",
                context_dir.display(),
                e
            ))
        })?;

        let target = self.resolve(mode_hint)?;
        let spec = command::build_command(&target, &context_dir, args);
        Ok((target, spec))
    }

    pub async fn invoke(
        &self,
        context_dir: &Path,
        args: &[String],
        mode_hint: Option<ExecutionMode>,
    ) -> Result<BuildInvocationResult> {
        self.invoke_with_timeout(context_dir, args, mode_hint, self.config.default_timeout)
            .await
    }

    pub async fn invoke_with_timeout(
        &self,
        context_dir: &Path,
        args: &[String],
        mode_hint: Option<ExecutionMode>,
        timeout: Option<Duration>,
    ) -> Result<BuildInvocationResult> {
        let (target, spec) = self.prepare(context_dir, args, mode_hint)?;
        let mode = target.mode();
        let command_used = spec.display();

        info!(%mode, command = %command_used, "Invoking op");
        let output = self.runner.run(&spec, timeout).await?;
        info!(%mode, exit_code = output.exit_code, "op finished");

        Ok(BuildInvocationResult {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            command_used,
            mode,
        })
    }
}
