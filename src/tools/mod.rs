pub mod implementations;
pub mod registry;
pub mod trait_def;

pub use registry::{
    error_envelope, ToolDefinition, ToolRegistry, GETTING_STARTED_URI, SKAFFOLD_PATTERNS_URI,
};
pub use trait_def::Tool;
