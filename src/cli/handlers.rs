//! Command handlers. Each returns the process exit code.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use super::commands::{
    BuildArgs, ConfigArgs, DetectArgs, GenerateTarget, OnboardArgs, SkaffoldArgs, ToolsCommand,
    WorkflowArgs,
};
use super::output::{OutputFormat, OutputFormatter};
use crate::config::OctopilotConfig;
use crate::context::{self, PipelineContext};
use crate::error::OctopilotError;
use crate::fs::RealFileSystem;
use crate::generate::{
    self, render_build_manifest, render_ci_workflow, BuildManifestRequest, GeneratedArtifact,
    OnboardOptions, OnboardPlan, WorkflowOptions,
};
use crate::invoker::{OpBuildRequest, OpInvoker};
use crate::tools::ToolRegistry;

fn load_config() -> Result<OctopilotConfig, i32> {
    let config = OctopilotConfig::default();
    config.validate().map_err(|e| {
        eprintln!("Error: {}", e);
        1
    })?;
    debug!(?config, "Configuration loaded");
    Ok(config)
}

fn workspace_or_cwd(workspace: &Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => Ok(path.clone()),
        None => std::env::current_dir().context("Failed to determine current directory"),
    }
}

fn report(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<OctopilotError>() {
        Some(e) => {
            error!(kind = %e.kind(), "{}", e);
            eprintln!("Error [{}]: {}", e.kind(), e);
        }
        None => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
        }
    }
    1
}

fn emit(content: &str, output: Option<&Path>, quiet: bool) -> Result<()> {
    match output {
        Some(path) => {
            write_file(path, content)?;
            if !quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
        None => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn handle_detect(args: &DetectArgs) -> i32 {
    let run = || -> Result<String> {
        let workspace = workspace_or_cwd(&args.workspace)?;
        info!(workspace = %workspace.display(), "Detecting project contexts");
        let context = context::detect_workspace(&RealFileSystem::new(), &workspace)?;
        OutputFormatter::new(args.format.into()).format_context(&context)
    };

    match run() {
        Ok(output) => {
            print!("{}", output);
            0
        }
        Err(e) => report(&e),
    }
}

pub fn handle_generate(target: &GenerateTarget, quiet: bool) -> i32 {
    let Ok(config) = load_config() else {
        return 1;
    };

    let result = match target {
        GenerateTarget::Skaffold(args) => generate_skaffold(args, &config)
            .and_then(|artifact| emit(&artifact.content, args.output.as_deref(), quiet)),
        GenerateTarget::Workflow(args) => generate_workflow(args)
            .and_then(|artifact| emit(&artifact.content, args.output.as_deref(), quiet)),
    };

    match result {
        Ok(()) => 0,
        Err(e) => report(&e),
    }
}

fn generate_skaffold(args: &SkaffoldArgs, config: &OctopilotConfig) -> Result<GeneratedArtifact> {
    let request = BuildManifestRequest {
        artifacts: args.artifacts.clone(),
        builder: args.builder.clone().or_else(|| Some(config.builder_image.clone())),
    };
    Ok(render_build_manifest(&request)?)
}

fn generate_workflow(args: &WorkflowArgs) -> Result<GeneratedArtifact> {
    let options = WorkflowOptions {
        registry: args.registry.clone(),
        platforms: args.platforms.clone(),
        golangci_lint_timeout: args.golangci_lint_timeout.clone(),
        promote_gate_placeholder: args.promote_gate_placeholder,
        promotion: args.promote_to.clone().map(Value::String),
    };

    let context: PipelineContext = match &args.context {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read pipeline context {}", path.display()))?;
            serde_json::from_str(&content).map_err(|e| {
                OctopilotError::InvalidArguments(format!(
                    "{} is not a pipeline context: {}",
                    path.display(),
                    e
                ))
            })?
        }
        None => {
            let workspace = workspace_or_cwd(&args.workspace)?;
            context::detect_workspace(&RealFileSystem::new(), &workspace)?
        }
    };

    Ok(render_ci_workflow(&context, &options)?)
}

pub async fn handle_build(args: &BuildArgs) -> i32 {
    let Ok(config) = load_config() else {
        return 1;
    };

    let run = async {
        let workspace = workspace_or_cwd(&args.workspace)?;
        let request = OpBuildRequest {
            workspace,
            registry: args.registry.clone(),
            platforms: args.platforms.clone(),
            push: args.push,
            extra_args: args.extra_args.clone(),
            mode_hint: args.mode_hint(),
            timeout: args.timeout,
        };
        let invoker = OpInvoker::new(config.invoker_config());
        let outcome = invoker.run_build(&request).await?;
        let output = OutputFormatter::new(args.format.into()).format_build(&outcome)?;
        Ok::<_, anyhow::Error>((outcome.invocation.exit_code, output))
    };

    match run.await {
        Ok((exit_code, output)) => {
            print!("{}", output);
            match exit_code {
                0 => 0,
                code if code > 0 => code,
                _ => 1,
            }
        }
        Err(e) => report(&e),
    }
}

pub fn handle_onboard(args: &OnboardArgs, quiet: bool) -> i32 {
    let Ok(config) = load_config() else {
        return 1;
    };

    let run = || -> Result<String> {
        let workspace = workspace_or_cwd(&args.workspace)?;
        let mut workflow = WorkflowOptions::new(args.registry.clone());
        workflow.platforms = args.platforms.clone();
        let options = OnboardOptions {
            workflow,
            builder: args.builder.clone().or_else(|| Some(config.builder_image.clone())),
        };

        let plan = generate::onboard(&RealFileSystem::new(), &workspace, &options)?;
        if args.write {
            write_plan(&workspace, &plan, quiet)?;
        }

        let format: OutputFormat = args.format.into();
        match format {
            OutputFormat::Human => Ok(format_plan_human(&plan)),
            _ => OutputFormatter::new(format).format_structured(&plan, "onboarding plan"),
        }
    };

    match run() {
        Ok(output) => {
            print!("{}", output);
            0
        }
        Err(e) => report(&e),
    }
}

/// Create the plan's files that do not exist yet; existing files are never overwritten
fn write_plan(workspace: &Path, plan: &OnboardPlan, quiet: bool) -> Result<()> {
    let artifacts = plan.skaffold_yaml.iter().chain(std::iter::once(&plan.ci_workflow));
    for artifact in artifacts.filter(|a| plan.files_to_create.contains(&a.path)) {
        let path = workspace.join(&artifact.path);
        if path.exists() {
            debug!(path = %path.display(), "Keeping existing file");
            continue;
        }
        write_file(&path, &artifact.content)?;
        if !quiet {
            eprintln!("Created {}", path.display());
        }
    }
    Ok(())
}

fn format_plan_human(plan: &OnboardPlan) -> String {
    let mut out = String::new();
    out.push_str("Files to create:\n");
    if plan.files_to_create.is_empty() {
        out.push_str("  (none)\n");
    }
    for path in &plan.files_to_create {
        out.push_str(&format!("  - {}\n", path));
    }
    out.push_str("\nNext steps:\n");
    for (i, step) in plan.next_steps.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, step));
    }
    out
}

pub async fn handle_tools(command: &ToolsCommand) -> i32 {
    let Ok(config) = load_config() else {
        return 1;
    };
    let registry = ToolRegistry::new(&config);

    match command {
        ToolsCommand::List => {
            let listing = serde_json::json!({
                "tools": registry.definitions(),
                "resources": registry.resource_uris(),
            });
            match serde_json::to_string_pretty(&listing) {
                Ok(text) => {
                    println!("{}", text);
                    0
                }
                Err(e) => report(&e.into()),
            }
        }
        ToolsCommand::Call(call) => {
            let envelope = match serde_json::from_str::<Value>(&call.args) {
                Ok(arguments) => registry.call(&call.name, arguments).await,
                Err(e) => crate::tools::error_envelope(&OctopilotError::InvalidArguments(format!(
                    "--args is not valid JSON: {}",
                    e
                ))),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| envelope.to_string())
            );
            if envelope["ok"] == Value::Bool(true) {
                0
            } else {
                1
            }
        }
    }
}

pub fn handle_schema() -> i32 {
    match serde_json::to_string_pretty(&context::schema()) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => report(&e.into()),
    }
}

pub fn handle_config(args: &ConfigArgs) -> i32 {
    let config = OctopilotConfig::default();
    let formatted = OutputFormatter::new(args.format.into()).format_config(&config);
    let code = match config.validate() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };
    match formatted {
        Ok(text) => {
            print!("{}", text);
            code
        }
        Err(e) => report(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_plan_keeps_existing_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("skaffold.yaml"), "existing").unwrap();

        let plan = OnboardPlan {
            pipeline_context: PipelineContext::default(),
            skaffold_yaml: Some(GeneratedArtifact {
                path: "skaffold.yaml".to_string(),
                content: "new".to_string(),
            }),
            ci_workflow: GeneratedArtifact {
                path: ".github/workflows/ci.yml".to_string(),
                content: "name: CI\n".to_string(),
            },
            files_to_create: vec!["skaffold.yaml".to_string(), ".github/workflows/ci.yml".to_string()],
            next_steps: Vec::new(),
        };

        write_plan(temp.path(), &plan, true).unwrap();

        assert_eq!(fs::read_to_string(temp.path().join("skaffold.yaml")).unwrap(), "existing");
        assert_eq!(
            fs::read_to_string(temp.path().join(".github/workflows/ci.yml")).unwrap(),
            "name: CI\n"
        );
    }

    #[test]
    fn test_format_plan_human() {
        let plan = OnboardPlan {
            pipeline_context: PipelineContext::default(),
            skaffold_yaml: None,
            ci_workflow: GeneratedArtifact {
                path: ".github/workflows/ci.yml".to_string(),
                content: String::new(),
            },
            files_to_create: Vec::new(),
            next_steps: vec!["Commit the workflow".to_string()],
        };

        let text = format_plan_human(&plan);
        assert!(text.contains("(none)"));
        assert!(text.contains("1. Commit the workflow"));
    }
}
