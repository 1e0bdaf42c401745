//! Rendering of `skaffold.yaml` and the CI workflow
//!
//! Every renderer is a pure function from typed input to a [`GeneratedArtifact`]:
//! nothing here touches the filesystem, the clock, or the environment, so equal
//! inputs always render byte-identical output. Writing the result is the caller's
//! job.
//!
//! Promotion is out of reach by construction. No renderer has a promotion job in
//! its vocabulary, and any request that tries to parameterize one is refused with
//! [`OctopilotError::UnsupportedOperation`].

mod onboard;
mod skaffold;
mod workflow;

pub use onboard::{onboard, OnboardOptions, OnboardPlan};
pub use skaffold::{render_build_manifest, ArtifactRequest, BuildManifestRequest, DEFAULT_BUILDER};
pub use workflow::{
    render_ci_workflow, WorkflowOptions, DEFAULT_GOLANGCI_LINT_TIMEOUT, DEFAULT_PLATFORMS,
    WORKFLOW_PATH,
};

use crate::error::{OctopilotError, Result};
use serde::Serialize;

/// Request keys that would parameterize a promotion step
pub const PROMOTION_KEYS: &[&str] = &["promote", "promotion", "promote_to", "environments"];

/// A rendered file, relative to the repository root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifact {
    pub path: String,
    pub content: String,
}

/// Refuse tool arguments that ask for promotion.
///
/// A key that is present counts even when its value is `null` or `false`.
pub fn reject_promotion_args(args: &serde_json::Value) -> Result<()> {
    let Some(object) = args.as_object() else {
        return Ok(());
    };
    match PROMOTION_KEYS.iter().find(|key| object.contains_key(**key)) {
        Some(key) => Err(OctopilotError::UnsupportedOperation(format!(
            "'{}' requests promotion; generated workflows only lint, test and build",
            key
        ))),
        None => Ok(()),
    }
}

fn to_yaml<T: Serialize>(value: &T, what: &str) -> Result<String> {
    serde_yaml::to_string(value)
        .map_err(|e| OctopilotError::InvalidArguments(format!("Failed to render {}: {}", what, e)))
}
