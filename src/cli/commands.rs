use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::generate::{ArtifactRequest, DEFAULT_GOLANGCI_LINT_TIMEOUT, DEFAULT_PLATFORMS};
use crate::invoker::{ExecutionMode, DEFAULT_BUILD_PLATFORMS};

/// CI/CD onboarding for container-built repositories
#[derive(Parser, Debug)]
#[command(
    name = "octopilot",
    about = "CI/CD onboarding for container-built repositories",
    version,
    author,
    long_about = "octopilot reads a repository's skaffold.yaml, detects the language and \
                  toolchain version of every artifact, and renders the CI workflow that lints, \
                  tests and builds them. It can also run `op build` locally or in a container. \
                  Promotion between environments is never generated or invoked."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Verbose logging (debug level)")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Detect languages and versions for every artifact",
        long_about = "Parses skaffold.yaml in the workspace and prints the pipeline context: \
                      detected languages, versions and per-artifact results.\n\n\
                      Examples:\n  \
                      octopilot detect\n  \
                      octopilot detect /path/to/repo --format json"
    )]
    Detect(DetectArgs),

    #[command(about = "Render skaffold.yaml or the CI workflow")]
    Generate(GenerateArgs),

    #[command(
        about = "Run `op build` in a workspace",
        long_about = "Runs `op build` with a local op binary, or inside the op container image \
                      when no binary is available or container mode is requested.\n\n\
                      Examples:\n  \
                      octopilot build --registry ghcr.io/my-org\n  \
                      octopilot build /path/to/repo --registry ghcr.io/my-org --push --container\n  \
                      octopilot build --registry ghcr.io/my-org -- --sbom"
    )]
    Build(BuildArgs),

    #[command(
        about = "Propose skaffold.yaml and the CI workflow for a repository",
        long_about = "Detects the repository, proposes skaffold.yaml when it is missing and the \
                      CI workflow, and lists the manual steps left. Use --write to create the \
                      proposed files that do not exist yet.\n\n\
                      Examples:\n  \
                      octopilot onboard --registry ghcr.io/my-org\n  \
                      octopilot onboard /path/to/repo --registry ghcr.io/my-org --write"
    )]
    Onboard(OnboardArgs),

    #[command(about = "List or call agent tools")]
    Tools(ToolsArgs),

    #[command(about = "Print the JSON Schema of the pipeline context")]
    Schema,

    #[command(about = "Show the effective configuration")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    #[arg(value_name = "WORKSPACE", help = "Repository root (defaults to current directory)")]
    pub workspace: Option<PathBuf>,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[command(subcommand)]
    pub target: GenerateTarget,
}

#[derive(Subcommand, Debug, Clone)]
pub enum GenerateTarget {
    #[command(
        about = "Render skaffold.yaml for the given artifacts",
        long_about = "Examples:\n  \
                      octopilot generate skaffold --artifact api=services/api --artifact web=web\n  \
                      octopilot generate skaffold --artifact api=. --output skaffold.yaml"
    )]
    Skaffold(SkaffoldArgs),

    #[command(
        about = "Render .github/workflows/ci.yml",
        long_about = "Renders the workflow from a saved pipeline context, or detects one from the \
                      workspace when --context is omitted.\n\n\
                      Examples:\n  \
                      octopilot generate workflow --registry ghcr.io/my-org\n  \
                      octopilot generate workflow --context context.json --registry ghcr.io/my-org"
    )]
    Workflow(WorkflowArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SkaffoldArgs {
    #[arg(
        long = "artifact",
        value_name = "NAME=CONTEXT",
        value_parser = parse_artifact,
        required = true,
        help = "Artifact to declare (repeatable)"
    )]
    pub artifacts: Vec<ArtifactRequest>,

    #[arg(long, value_name = "IMAGE", help = "Buildpack builder image")]
    pub builder: Option<String>,

    #[arg(short = 'o', long, value_name = "FILE", help = "Write to file instead of stdout")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct WorkflowArgs {
    #[arg(long, value_name = "FILE", help = "Pipeline context JSON produced by `detect --format json`")]
    pub context: Option<PathBuf>,

    #[arg(long, value_name = "DIR", conflicts_with = "context", help = "Workspace to detect when no context file is given")]
    pub workspace: Option<PathBuf>,

    #[arg(long, value_name = "REGISTRY", help = "Target registry, e.g. ghcr.io/my-org")]
    pub registry: String,

    #[arg(long, default_value = DEFAULT_PLATFORMS, help = "Comma-separated build platforms")]
    pub platforms: String,

    #[arg(long, default_value = DEFAULT_GOLANGCI_LINT_TIMEOUT, help = "golangci-lint timeout")]
    pub golangci_lint_timeout: String,

    #[arg(long, help = "Append a comment-only promote gate placeholder")]
    pub promote_gate_placeholder: bool,

    /// Accepted only to be refused
    #[arg(long, value_name = "ENV", hide = true)]
    pub promote_to: Option<String>,

    #[arg(short = 'o', long, value_name = "FILE", help = "Write to file instead of stdout")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[arg(value_name = "WORKSPACE", help = "Repository root (defaults to current directory)")]
    pub workspace: Option<PathBuf>,

    #[arg(long, value_name = "REGISTRY", help = "Target registry, e.g. ghcr.io/my-org")]
    pub registry: String,

    #[arg(long, default_value = DEFAULT_BUILD_PLATFORMS, help = "Comma-separated build platforms")]
    pub platforms: String,

    #[arg(long, help = "Push images after building")]
    pub push: bool,

    #[arg(long, conflicts_with = "binary", help = "Run op inside its container image")]
    pub container: bool,

    #[arg(long, help = "Run a local op binary")]
    pub binary: bool,

    #[arg(long, value_name = "SECONDS", help = "Kill the build after this many seconds")]
    pub timeout: Option<u64>,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,

    #[arg(last = true, value_name = "OP_ARGS", help = "Extra arguments passed to op build")]
    pub extra_args: Vec<String>,
}

impl BuildArgs {
    pub fn mode_hint(&self) -> Option<ExecutionMode> {
        if self.container {
            Some(ExecutionMode::Container)
        } else if self.binary {
            Some(ExecutionMode::Binary)
        } else {
            None
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct OnboardArgs {
    #[arg(value_name = "WORKSPACE", help = "Repository root (defaults to current directory)")]
    pub workspace: Option<PathBuf>,

    #[arg(long, value_name = "REGISTRY", help = "Target registry, e.g. ghcr.io/my-org")]
    pub registry: String,

    #[arg(long, default_value = DEFAULT_PLATFORMS, help = "Comma-separated build platforms")]
    pub platforms: String,

    #[arg(long, value_name = "IMAGE", help = "Buildpack builder image for a generated skaffold.yaml")]
    pub builder: Option<String>,

    #[arg(long, help = "Create the proposed files that do not exist yet")]
    pub write: bool,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct ToolsArgs {
    #[command(subcommand)]
    pub command: ToolsCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ToolsCommand {
    #[command(about = "List tools with their argument schemas")]
    List,

    #[command(
        about = "Call a tool and print its result envelope",
        long_about = "Examples:\n  \
                      octopilot tools call detect_project_contexts --args '{\"workspace\": \"/repo\"}'"
    )]
    Call(ToolCallArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ToolCallArgs {
    #[arg(value_name = "NAME")]
    pub name: String,

    #[arg(long, value_name = "JSON", default_value = "{}", help = "Arguments object")]
    pub args: String,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_artifact(s: &str) -> Result<ArtifactRequest, String> {
    let (name, context) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid artifact '{}': expected NAME=CONTEXT", s))?;
    let (name, context) = (name.trim(), context.trim());
    if name.is_empty() || context.is_empty() {
        return Err(format!("Invalid artifact '{}': name and context must not be empty", s));
    }
    Ok(ArtifactRequest::new(name, context))
}
