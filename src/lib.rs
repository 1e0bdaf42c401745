//! octopilot - CI/CD onboarding for container-built repositories
//!
//! Reads a repository's `skaffold.yaml`, detects the language and toolchain
//! version behind every artifact, and renders the CI workflow that lints, tests
//! and builds them. A separate invoker runs the `op` build tool either from a
//! local binary or inside its container image.
//!
//! # Example Usage
//!
//! ```no_run
//! use octopilot::context;
//! use octopilot::fs::RealFileSystem;
//! use octopilot::generate::{render_ci_workflow, WorkflowOptions};
//! use std::path::Path;
//!
//! let fs = RealFileSystem::new();
//! let pipeline = context::detect_workspace(&fs, Path::new("/path/to/repo"))?;
//!
//! for lv in &pipeline.languages {
//!     println!("{} {:?}", lv.language, lv.version);
//! }
//!
//! let workflow = render_ci_workflow(&pipeline, &WorkflowOptions::new("ghcr.io/my-org"))?;
//! println!("{}", workflow.content);
//! # Ok::<(), octopilot::OctopilotError>(())
//! ```
//!
//! # Project Structure
//!
//! - [`manifest`]: `skaffold.yaml` parsing
//! - [`detection`]: first-match-wins language probes
//! - [`context`]: pipeline context and build matrix
//! - [`generate`]: `skaffold.yaml`, CI workflow and onboarding plans
//! - [`invoker`]: binary or container execution of `op`
//! - [`tools`]: agent-facing tool registry

pub mod cli;
pub mod config;
pub mod context;
pub mod detection;
pub mod error;
pub mod fs;
pub mod generate;
pub mod invoker;
pub mod manifest;
pub mod stack;
pub mod tools;
pub mod util;

pub use config::{ConfigError, OctopilotConfig};
pub use context::PipelineContext;
pub use detection::{Confidence, LanguageDetection};
pub use error::{ErrorKind, OctopilotError, Result};
pub use invoker::{BuildInvocationResult, ExecutionMode, InvokerConfig, OpInvoker};
pub use stack::LanguageId;
pub use tools::ToolRegistry;
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_octopilot() {
        assert_eq!(NAME, "octopilot");
    }
}
