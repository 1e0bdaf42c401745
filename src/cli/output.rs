//! Output formatting for command results
//!
//! JSON and YAML are the machine-readable forms; the human form is a compact
//! summary for terminals.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;

use crate::config::OctopilotConfig;
use crate::context::PipelineContext;
use crate::invoker::OpBuildOutcome;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_context(&self, context: &PipelineContext) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(format_context_human(context)),
            _ => self.format_structured(context, "pipeline context"),
        }
    }

    pub fn format_build(&self, outcome: &OpBuildOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(format_build_human(outcome)),
            _ => self.format_structured(outcome, "build outcome"),
        }
    }

    pub fn format_config(&self, config: &OctopilotConfig) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(config.to_string()),
            _ => self.format_structured(&config.to_display_map(), "configuration"),
        }
    }

    /// JSON or YAML; the human form falls back to pretty JSON
    pub fn format_structured<T: Serialize + ?Sized>(&self, value: &T, what: &str) -> Result<String> {
        match self.format {
            OutputFormat::Yaml => {
                serde_yaml::to_string(value).with_context(|| format!("Failed to serialize {} to YAML", what))
            }
            OutputFormat::Json | OutputFormat::Human => serde_json::to_string_pretty(value)
                .with_context(|| format!("Failed to serialize {} to JSON", what)),
        }
    }
}

fn format_context_human(context: &PipelineContext) -> String {
    let mut out = String::new();

    if context.warnings.is_empty() {
        out.push_str("\u{2713} Pipeline Context\n");
    } else {
        out.push_str("\u{26A0} Pipeline Context (degraded)\n");
    }
    let _ = writeln!(out, "{}\n", RULE);

    out.push_str("Languages:\n");
    if context.languages.is_empty() {
        out.push_str("\u{2514}\u{2500} (none detected)\n");
    }
    for (i, lv) in context.languages.iter().enumerate() {
        let connector = if i + 1 == context.languages.len() { "\u{2514}" } else { "\u{251C}" };
        let _ = writeln!(
            out,
            "{}\u{2500} {:<8} {}",
            connector,
            lv.language.as_str(),
            lv.version.as_deref().unwrap_or("(toolchain default)")
        );
    }

    out.push_str("\nArtifacts:\n");
    for (i, artifact) in context.artifacts.iter().enumerate() {
        let connector = if i + 1 == context.artifacts.len() { "\u{2514}" } else { "\u{251C}" };
        let _ = writeln!(
            out,
            "{}\u{2500} {} ({}): {} {} [{}]",
            connector,
            artifact.image,
            artifact.context,
            artifact.language.as_str(),
            artifact.version.as_deref().unwrap_or("-"),
            serde_json::to_value(artifact.confidence)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default()
        );
    }

    if !context.warnings.is_empty() {
        out.push_str("\n\u{26A0} Warnings:\n");
        for warning in &context.warnings {
            let _ = writeln!(out, "  - {}: {}", warning.image, warning.message);
        }
    }

    out
}

fn format_build_human(outcome: &OpBuildOutcome) -> String {
    let invocation = &outcome.invocation;
    let mut out = String::new();

    if invocation.success() {
        out.push_str("\u{2713} op build succeeded\n");
    } else {
        let _ = writeln!(out, "\u{2717} op build failed (exit code {})", invocation.exit_code);
    }
    let _ = writeln!(out, "{}\n", RULE);
    let _ = writeln!(out, "Mode:     {}", invocation.mode);
    let _ = writeln!(out, "Command:  {}", invocation.command_used);

    if !invocation.stdout.is_empty() {
        let _ = write!(out, "\nstdout:\n{}", invocation.stdout);
        if !invocation.stdout.ends_with('\n') {
            out.push('\n');
        }
    }
    if !invocation.stderr.is_empty() {
        let _ = write!(out, "\nstderr:\n{}", invocation.stderr);
        if !invocation.stderr.ends_with('\n') {
            out.push('\n');
        }
    }
    if let Some(result) = &outcome.build_result {
        let _ = writeln!(
            out,
            "\nBuild result:\n{}",
            serde_json::to_string_pretty(result).unwrap_or_default()
        );
    }

    out
}
