//! Configuration management for octopilot
//!
//! Settings are loaded from environment variables with defaults; nothing is read
//! from disk. `OctopilotConfig::default()` performs the load, `validate()` checks
//! ranges, and `invoker_config()` projects the subset the build invoker needs.
//!
//! # Environment Variables
//!
//! ## Build invocation
//! - `OP_BINARY`: Path to a local `op` binary - default: look up `op` on `PATH`
//! - `OP_IMAGE`: Container image for containerized `op` - default: "ghcr.io/octopilot/op:v1.0.0"
//! - `OP_USE_CONTAINER`: Force container mode (true|1|yes, case-insensitive) - default: unset
//! - `OCTOPILOT_BUILD_TIMEOUT`: Seconds before a build is killed - default: "1800"
//!
//! ## Generation
//! - `OCTOPILOT_BUILDER`: Buildpack builder for generated manifests - default:
//!   "ghcr.io/octopilot/builder-jammy-base:latest"
//!
//! ## Logging
//! - `OCTOPILOT_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use octopilot::OctopilotConfig;
//! use std::env;
//!
//! env::set_var("OP_USE_CONTAINER", "true");
//!
//! let config = OctopilotConfig::default();
//! config.validate().expect("Invalid configuration");
//!
//! let invoker = octopilot::invoker::OpInvoker::new(config.invoker_config());
//! ```

use crate::generate::DEFAULT_BUILDER;
use crate::invoker::{ExecutionMode, InvokerConfig, DEFAULT_OP_IMAGE};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 1800;
const MAX_BUILD_TIMEOUT_SECS: u64 = 86_400;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Main configuration structure for octopilot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OctopilotConfig {
    /// Local `op` binary
    pub binary_path: Option<PathBuf>,

    /// Container image used when `op` runs containerized
    pub image_ref: String,

    /// Set when the environment forces a mode
    pub mode_override: Option<ExecutionMode>,

    /// Buildpack builder for generated `skaffold.yaml` files
    pub builder_image: String,

    /// Build timeout in seconds
    pub build_timeout_secs: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for OctopilotConfig {
    /// Loads from environment variables, falling back to defaults for anything unset
    fn default() -> Self {
        let binary_path = non_empty_var("OP_BINARY").map(PathBuf::from);

        let image_ref = non_empty_var("OP_IMAGE").unwrap_or_else(|| DEFAULT_OP_IMAGE.to_string());

        let mode_override = env::var("OP_USE_CONTAINER")
            .ok()
            .filter(|v| is_truthy(v))
            .map(|_| ExecutionMode::Container);

        let builder_image =
            non_empty_var("OCTOPILOT_BUILDER").unwrap_or_else(|| DEFAULT_BUILDER.to_string());

        let build_timeout_secs = env::var("OCTOPILOT_BUILD_TIMEOUT")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_BUILD_TIMEOUT_SECS);

        let log_level = env::var("OCTOPILOT_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            binary_path,
            image_ref,
            mode_override,
            builder_image,
            build_timeout_secs,
            log_level,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `true`, `1` or `yes`, case-insensitive
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

impl OctopilotConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the timeout is out of range, the image reference
    /// is blank, or the log level is unknown
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Build timeout must be at least 1 second".to_string(),
            ));
        }
        if self.build_timeout_secs > MAX_BUILD_TIMEOUT_SECS {
            return Err(ConfigError::ValidationFailed(
                "Build timeout cannot exceed 24 hours".to_string(),
            ));
        }

        if self.image_ref.trim().is_empty() || self.image_ref.chars().any(char::is_whitespace) {
            return Err(ConfigError::ParseError {
                field: "OP_IMAGE".to_string(),
                error: format!("'{}' is not an image reference", self.image_ref),
            });
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// Options for [`crate::invoker::OpInvoker`]
    pub fn invoker_config(&self) -> InvokerConfig {
        InvokerConfig {
            binary_path: self.binary_path.clone(),
            image_ref: self.image_ref.clone(),
            mode_override: self.mode_override,
            default_timeout: Some(self.build_timeout()),
        }
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();

        if let Some(ref path) = self.binary_path {
            map.insert("binary_path".to_string(), path.display().to_string());
        }
        map.insert("image_ref".to_string(), self.image_ref.clone());
        map.insert(
            "mode_override".to_string(),
            self.mode_override
                .map(|m| m.to_string())
                .unwrap_or_else(|| "auto".to_string()),
        );
        map.insert("builder_image".to_string(), self.builder_image.clone());
        map.insert(
            "build_timeout_secs".to_string(),
            self.build_timeout_secs.to_string(),
        );
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Display for OctopilotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Octopilot Configuration:")?;
        if let Some(ref path) = self.binary_path {
            writeln!(f, "  Binary: {}", path.display())?;
        }
        writeln!(f, "  Image: {}", self.image_ref)?;
        match self.mode_override {
            Some(mode) => writeln!(f, "  Mode: {} (forced)", mode)?,
            None => writeln!(f, "  Mode: auto")?,
        }
        writeln!(f, "  Builder: {}", self.builder_image)?;
        writeln!(f, "  Build Timeout: {}s", self.build_timeout_secs)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: &[&str] = &[
        "OP_BINARY",
        "OP_IMAGE",
        "OP_USE_CONTAINER",
        "OCTOPILOT_BUILDER",
        "OCTOPILOT_BUILD_TIMEOUT",
        "OCTOPILOT_LOG_LEVEL",
    ];

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn clean_env() -> Vec<EnvGuard> {
        VARS.iter().map(|key| EnvGuard::unset(key)).collect()
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clean_env();

        let config = OctopilotConfig::default();

        assert_eq!(config.binary_path, None);
        assert_eq!(config.image_ref, DEFAULT_OP_IMAGE);
        assert_eq!(config.mode_override, None);
        assert_eq!(config.builder_image, DEFAULT_BUILDER);
        assert_eq!(config.build_timeout_secs, DEFAULT_BUILD_TIMEOUT_SECS);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _clean = clean_env();
        let _guards = vec![
            EnvGuard::set("OP_BINARY", "/opt/op/bin/op"),
            EnvGuard::set("OP_IMAGE", "ghcr.io/octopilot/op:v1.2.0"),
            EnvGuard::set("OP_USE_CONTAINER", "YES"),
            EnvGuard::set("OCTOPILOT_BUILDER", "paketobuildpacks/builder-jammy-full"),
            EnvGuard::set("OCTOPILOT_BUILD_TIMEOUT", "600"),
            EnvGuard::set("OCTOPILOT_LOG_LEVEL", "DEBUG"),
        ];

        let config = OctopilotConfig::default();

        assert_eq!(config.binary_path, Some(PathBuf::from("/opt/op/bin/op")));
        assert_eq!(config.image_ref, "ghcr.io/octopilot/op:v1.2.0");
        assert_eq!(config.mode_override, Some(ExecutionMode::Container));
        assert_eq!(config.builder_image, "paketobuildpacks/builder-jammy-full");
        assert_eq!(config.build_timeout_secs, 600);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_use_container_falsy_values() {
        let _clean = clean_env();
        for value in ["false", "0", "no", "", "maybe"] {
            let _guard = EnvGuard::set("OP_USE_CONTAINER", value);
            assert_eq!(OctopilotConfig::default().mode_override, None, "value {:?}", value);
        }
    }

    #[test]
    #[serial]
    fn test_blank_image_falls_back_to_default() {
        let _clean = clean_env();
        let _guard = EnvGuard::set("OP_IMAGE", "   ");
        assert_eq!(OctopilotConfig::default().image_ref, DEFAULT_OP_IMAGE);
    }

    #[test]
    #[serial]
    fn test_unparseable_timeout_uses_default() {
        let _clean = clean_env();
        let _guard = EnvGuard::set("OCTOPILOT_BUILD_TIMEOUT", "soon");
        assert_eq!(
            OctopilotConfig::default().build_timeout_secs,
            DEFAULT_BUILD_TIMEOUT_SECS
        );
    }

    #[test]
    #[serial]
    fn test_validation_rejects_bad_values() {
        let _clean = clean_env();

        let mut config = OctopilotConfig::default();
        config.build_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = OctopilotConfig::default();
        config.build_timeout_secs = MAX_BUILD_TIMEOUT_SECS + 1;
        assert!(config.validate().is_err());

        let mut config = OctopilotConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = OctopilotConfig::default();
        config.image_ref = "ghcr.io/octopilot/op v1".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    #[serial]
    fn test_invoker_config_projection() {
        let _clean = clean_env();
        let _guard = EnvGuard::set("OCTOPILOT_BUILD_TIMEOUT", "90");

        let invoker = OctopilotConfig::default().invoker_config();

        assert_eq!(invoker.image_ref, DEFAULT_OP_IMAGE);
        assert_eq!(invoker.default_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let _clean = clean_env();
        let display = format!("{}", OctopilotConfig::default());
        assert!(display.contains("Octopilot Configuration:"));
        assert!(display.contains("Mode: auto"));
    }
}
