//! Tool trait and registry — the dispatch boundary.
//!
//! Tools are the administrative operations the model may request: create a
//! program, list semesters, and so on. The core never knows the entities
//! behind them; it sees only name, schema, and a JSON-in/JSON-out handler.
//!
//! The registry is built once at startup and immutable after that, so it is
//! safely shared across every concurrent query. `invoke` always settles to a
//! `ToolResult` — unknown tools, bad arguments, and handler failures all
//! become `Err` outcomes, never escaping errors, so the loop needs no
//! defensive handling around dispatch.

use async_trait::async_trait;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::{RegistryError, ToolError, ValidationError, ValidationIssue};
use crate::turn::{ToolCallRequest, ToolResult};

/// One catalog entry advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCatalogEntry {
    /// Unique tool name
    pub name: String,

    /// What the tool does (sent to the model)
    pub description: String,

    /// JSON Schema for the tool's arguments
    pub parameters: serde_json::Value,
}

/// The core Tool trait.
///
/// Each administrative operation implements this and is registered in the
/// `ToolRegistry`. Handlers receive arguments that already passed schema
/// validation; they may still fail for domain reasons (duplicate code,
/// unknown record), which dispatch converts to an `Err` outcome.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "create_program").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's arguments.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Run the tool against validated arguments.
    async fn handle(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;

    /// Convert this tool into a catalog entry for the model.
    fn catalog_entry(&self) -> ToolCatalogEntry {
        ToolCatalogEntry {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

struct RegisteredTool {
    tool: Box<dyn Tool>,
    schema: JSONSchema,
}

impl RegisteredTool {
    fn check(&self, arguments: &serde_json::Value) -> Result<(), ValidationError> {
        if let Err(errors) = self.schema.validate(arguments) {
            let issues: Vec<ValidationIssue> = errors
                .map(|e| ValidationIssue {
                    path: e.instance_path.to_string(),
                    reason: e.to_string(),
                })
                .collect();
            return Err(ValidationError::new(issues));
        }
        Ok(())
    }
}

/// The static catalog of tools, keyed by name.
///
/// The loop uses this to advertise the catalog to the model and to dispatch
/// the calls the model requests.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, compiling its parameter schema.
    ///
    /// Fails on a duplicate name or a schema that does not compile. Names
    /// are never silently replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateToolName(name));
        }
        let schema_value = tool.parameters_schema();
        let schema =
            JSONSchema::compile(&schema_value).map_err(|e| RegistryError::InvalidSchema {
                tool_name: name.clone(),
                reason: e.to_string(),
            })?;
        self.tools.insert(name, RegisteredTool { tool, schema });
        Ok(())
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Result<&dyn Tool, ToolError> {
        self.tools
            .get(name)
            .map(|r| r.tool.as_ref())
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Validate raw arguments against a tool's schema.
    ///
    /// Returns every issue found, each with the JSON pointer of the
    /// offending field.
    pub fn validate(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<(), ToolError> {
        let registered = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        registered.check(arguments)?;
        Ok(())
    }

    /// Resolve, validate, and run one call, always settling to a result.
    pub async fn invoke(&self, call: &ToolCallRequest) -> ToolResult {
        match self.dispatch(call).await {
            Ok(value) => ToolResult::ok(call, value),
            Err(e) => {
                warn!(
                    call_id = %call.call_id,
                    tool = %call.tool_name,
                    error = %e,
                    "tool call failed"
                );
                ToolResult::err(call, e.to_string())
            }
        }
    }

    async fn dispatch(
        &self,
        call: &ToolCallRequest,
    ) -> std::result::Result<serde_json::Value, ToolError> {
        let registered = self
            .tools
            .get(&call.tool_name)
            .ok_or_else(|| ToolError::NotFound(call.tool_name.clone()))?;
        registered.check(&call.arguments)?;
        registered.tool.handle(call.arguments.clone()).await
    }

    /// All catalog entries, sorted by name for stable presentation.
    pub fn catalog(&self) -> Vec<ToolCatalogEntry> {
        let mut entries: Vec<ToolCatalogEntry> =
            self.tools.values().map(|r| r.tool.catalog_entry()).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
