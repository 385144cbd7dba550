//! Tool system for Waypoint sessions
//!
//! The session driver only sees a [`ToolProvider`]: something that can list
//! a tool catalog and execute a call by name. Two providers ship here:
//! - [`ToolRegistry`] for in-process tools implementing [`Tool`]
//! - `McpToolProvider` (feature `mcp`) for tools served by an MCP server

pub mod calculator;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod spec;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{Result, ToolError};

pub use calculator::Calculator;
pub use spec::{ToolSpecOptions, ToolSpecification};

/// Boxed future type for object-safe async trait methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A tool as advertised by a provider's catalog, before conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    /// Free-text description, possibly spanning several lines
    pub description: String,
    /// JSON-schema-like object with `properties` and `required`
    pub input_schema: Value,
}

/// What a provider returns for one call: text segments and an error flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallOutput {
    pub content: Vec<String>,
    pub is_error: bool,
}

impl ToolCallOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![text.into()],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![text.into()],
            is_error: true,
        }
    }
}

/// Source of tools for a session
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Fetch the tool catalog
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Execute a tool by name
    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> std::result::Result<ToolCallOutput, ToolError>;
}

#[async_trait]
impl<P: ToolProvider + ?Sized> ToolProvider for Arc<P> {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        (**self).list_tools().await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> std::result::Result<ToolCallOutput, ToolError> {
        (**self).call_tool(name, arguments).await
    }
}

/// Output from a local tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Whether the tool succeeded
    pub success: bool,
    /// The output content (can be text, JSON, etc.)
    pub content: Value,
    /// Optional error message
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn success(content: impl Into<Value>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: Value::Null,
            error: Some(message.into()),
        }
    }
}

impl From<ToolOutput> for ToolCallOutput {
    fn from(output: ToolOutput) -> Self {
        if output.success {
            let text = match output.content {
                Value::String(s) => s,
                other => other.to_string(),
            };
            ToolCallOutput::text(text)
        } else {
            ToolCallOutput::error(output.error.unwrap_or_else(|| "Tool failed".to_string()))
        }
    }
}

/// Core trait for in-process tools
pub trait Tool: Send + Sync {
    /// Tool name (used by the model to invoke)
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with given parameters
    fn execute(&self, params: Value) -> BoxFuture<'_, std::result::Result<ToolOutput, ToolError>>;

    /// Catalog entry for this tool
    fn to_descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

/// Registry of in-process tools, listed in name order
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolProvider for ToolRegistry {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(self.tools.values().map(|t| t.to_descriptor()).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> std::result::Result<ToolCallOutput, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let output = tool.execute(Value::Object(arguments.clone())).await?;
        Ok(output.into())
    }
}

/// Helper macro for creating tool parameter schemas
#[macro_export]
macro_rules! tool_params {
    ($($field:ident : $type:expr => $desc:expr),* $(,)?) => {
        serde_json::json!({
            "type": "object",
            "properties": {
                $( stringify!($field): { "type": $type, "description": $desc } ),*
            },
            "required": [ $( stringify!($field) ),* ]
        })
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_output_conversion() {
        let ok: ToolCallOutput = ToolOutput::success("4").into();
        assert_eq!(ok, ToolCallOutput::text("4"));

        let json: ToolCallOutput = ToolOutput::success(serde_json::json!({"a": 1})).into();
        assert_eq!(json.content, vec!["{\"a\":1}".to_string()]);

        let err: ToolCallOutput = ToolOutput::error("bad").into();
        assert!(err.is_error);
        assert_eq!(err.content, vec!["bad".to_string()]);
    }

    #[tokio::test]
    async fn test_registry_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.call_tool("missing", &Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_registry_lists_in_name_order() {
        struct Named(&'static str);
        impl Tool for Named {
            fn name(&self) -> &str {
                self.0
            }
            fn description(&self) -> &str {
                "named"
            }
            fn parameters_schema(&self) -> Value {
                tool_params!()
            }
            fn execute(&self, _params: Value) -> BoxFuture<'_, std::result::Result<ToolOutput, ToolError>> {
                Box::pin(async { Ok(ToolOutput::success("ok")) })
            }
        }

        let registry = ToolRegistry::new()
            .with_tool(Arc::new(Named("zeta")))
            .with_tool(Arc::new(Named("alpha")));
        let names: Vec<_> = registry
            .list_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
