use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON Schema of the arguments object
    fn schema(&self) -> Value;
    async fn execute(&self, arguments: Value) -> Result<Value>;
}
