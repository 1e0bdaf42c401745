//! Tool registry
//!
//! Holds every callable operation and converts each outcome into the envelope
//! returned to agents:
//!
//! - `{"ok": true, "result": ...}`
//! - `{"ok": false, "error": {"kind": ..., "message": ...}}`

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::implementations::*;
use super::trait_def::Tool;
use crate::config::OctopilotConfig;
use crate::context;
use crate::error::{OctopilotError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::invoker::OpInvoker;

pub const GETTING_STARTED_URI: &str = "octopilot://docs/getting-started";
pub const SKAFFOLD_PATTERNS_URI: &str = "octopilot://docs/skaffold-patterns";

const GETTING_STARTED: &str = include_str!("docs/getting-started.md");
const SKAFFOLD_PATTERNS: &str = include_str!("docs/skaffold-patterns.md");

/// Name, description and argument schema of a tool, as advertised to callers
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Registry of all available tools
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry over the real filesystem and a process-backed invoker
    pub fn new(config: &OctopilotConfig) -> Self {
        Self::with_parts(
            Arc::new(RealFileSystem::new()),
            Arc::new(OpInvoker::new(config.invoker_config())),
            config.builder_image.clone(),
        )
    }

    pub fn with_parts(fs: Arc<dyn FileSystem>, invoker: Arc<OpInvoker>, builder: String) -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(DetectProjectContextsTool::new(Arc::clone(&fs))),
            Arc::new(GenerateSkaffoldYamlTool::new(builder.clone())),
            Arc::new(GenerateCiWorkflowTool),
            Arc::new(OnboardRepositoryTool::new(fs, builder)),
            Arc::new(RunOpBuildTool::new(invoker)),
        ];

        Self { tools }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.schema(),
            })
            .collect()
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// URIs served by [`ToolRegistry::resource`]
    pub fn resource_uris(&self) -> Vec<&'static str> {
        vec![context::SCHEMA_URI, GETTING_STARTED_URI, SKAFFOLD_PATTERNS_URI]
    }

    /// The pipeline context schema as JSON; the guides as markdown strings
    pub fn resource(&self, uri: &str) -> Result<Value> {
        match uri {
            context::SCHEMA_URI => Ok(context::schema_json()),
            GETTING_STARTED_URI => Ok(Value::String(GETTING_STARTED.to_string())),
            SKAFFOLD_PATTERNS_URI => Ok(Value::String(SKAFFOLD_PATTERNS.to_string())),
            _ => Err(OctopilotError::InvalidArguments(format!(
                "unknown resource '{}'",
                uri
            ))),
        }
    }

    /// Run a tool and return its raw result
    pub async fn execute(&self, tool_name: &str, arguments: Value) -> Result<Value> {
        info!(tool = tool_name, "Executing tool");
        debug!(tool = tool_name, args = %arguments, "Tool arguments");

        let tool = self
            .get_tool(tool_name)
            .ok_or_else(|| OctopilotError::UnknownTool(tool_name.to_string()))?;

        let result = tool.execute(arguments).await;
        match &result {
            Ok(_) => info!(tool = tool_name, "Tool execution completed"),
            Err(e) => warn!(tool = tool_name, kind = %e.kind(), error = %e, "Tool execution failed"),
        }
        result
    }

    /// Run a tool and wrap the outcome in the result envelope
    pub async fn call(&self, tool_name: &str, arguments: Value) -> Value {
        match self.execute(tool_name, arguments).await {
            Ok(result) => json!({ "ok": true, "result": result }),
            Err(e) => error_envelope(&e),
        }
    }
}

pub fn error_envelope(error: &OctopilotError) -> Value {
    let mut body = json!({
        "kind": error.kind(),
        "message": error.to_string(),
    });
    if let OctopilotError::Timeout { stdout, stderr, .. } = error {
        body["stdout"] = json!(stdout);
        body["stderr"] = json!(stderr);
    }
    json!({ "ok": false, "error": body })
}
