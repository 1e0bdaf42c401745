//! Error taxonomy shared by every operation.
//!
//! Each variant maps to a stable [`ErrorKind`] so callers can branch on the kind
//! without parsing messages. Detection degradation is deliberately absent: it is
//! reported inline as a [`crate::context::DetectionWarning`], never raised.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OctopilotError>;

#[derive(Debug, Error)]
pub enum OctopilotError {
    #[error("Build manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("Invalid build manifest: {0}")]
    ManifestInvalid(String),

    #[error("No execution environment available: {0}")]
    ExecutionEnvironmentUnavailable(String),

    #[error("Forbidden operation: {0}")]
    ForbiddenOperation(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The subprocess outlived its bound and was killed. Output captured before
    /// the kill is preserved.
    #[error("Command timed out after {limit:?}: {command}")]
    Timeout {
        limit: Duration,
        command: String,
        stdout: String,
        stderr: String,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Stable, serializable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ManifestNotFound,
    ManifestInvalid,
    ExecutionEnvironmentUnavailable,
    ForbiddenOperation,
    UnsupportedOperation,
    InvalidCommand,
    InvalidArguments,
    UnknownTool,
    Timeout,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ManifestNotFound => "manifest_not_found",
            ErrorKind::ManifestInvalid => "manifest_invalid",
            ErrorKind::ExecutionEnvironmentUnavailable => "execution_environment_unavailable",
            ErrorKind::ForbiddenOperation => "forbidden_operation",
            ErrorKind::UnsupportedOperation => "unsupported_operation",
            ErrorKind::InvalidCommand => "invalid_command",
            ErrorKind::InvalidArguments => "invalid_arguments",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OctopilotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OctopilotError::ManifestNotFound(_) => ErrorKind::ManifestNotFound,
            OctopilotError::ManifestInvalid(_) => ErrorKind::ManifestInvalid,
            OctopilotError::ExecutionEnvironmentUnavailable(_) => {
                ErrorKind::ExecutionEnvironmentUnavailable
            }
            OctopilotError::ForbiddenOperation(_) => ErrorKind::ForbiddenOperation,
            OctopilotError::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            OctopilotError::InvalidCommand(_) => ErrorKind::InvalidCommand,
            OctopilotError::InvalidArguments(_) => ErrorKind::InvalidArguments,
            OctopilotError::UnknownTool(_) => ErrorKind::UnknownTool,
            OctopilotError::Timeout { .. } => ErrorKind::Timeout,
            OctopilotError::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        OctopilotError::Io {
            context: context.into(),
            source,
        }
    }

    /// Caller-fixable input problems, as opposed to environment or execution failures.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ManifestNotFound
                | ErrorKind::ManifestInvalid
                | ErrorKind::InvalidCommand
                | ErrorKind::InvalidArguments
                | ErrorKind::UnknownTool
        )
    }
}
