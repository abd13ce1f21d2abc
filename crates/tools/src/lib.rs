//! Administrative tool implementations for Provost.
//!
//! Tools give the model the ability to act on campus records: create a
//! program, add a level under it, list semesters. They all operate on one
//! shared [`CampusDirectory`] and expose themselves to the loop through the
//! uniform `Tool` contract — the orchestration core never sees the entity
//! types behind them.

pub mod directory;
pub mod level;
pub mod program;
pub mod semester;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use provost_core::{RegistryError, ToolError, ToolRegistry, ValidationError, ValidationIssue};

pub use directory::{CampusDirectory, DirectoryError, Level, Program, Semester};

/// Parse schema-validated arguments into a typed struct.
///
/// Dispatch has already validated against the tool's schema, so a failure
/// here means the schema and the struct disagree; it is still reported as an
/// argument problem rather than a panic.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| {
        ToolError::InvalidArguments(ValidationError::new(vec![ValidationIssue {
            path: String::new(),
            reason: e.to_string(),
        }]))
    })
}

/// Serialize a record into the tool's output value.
pub(crate) fn to_output<T: Serialize>(tool_name: &str, record: &T) -> Result<serde_json::Value, ToolError> {
    serde_json::to_value(record).map_err(|e| ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: format!("could not serialize output: {e}"),
    })
}

/// Build the standard administrative registry over one campus directory.
pub fn default_registry(directory: Arc<CampusDirectory>) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(program::CreateProgramTool::new(directory.clone())))?;
    registry.register(Box::new(program::ListProgramsTool::new(directory.clone())))?;
    registry.register(Box::new(level::CreateLevelTool::new(directory.clone())))?;
    registry.register(Box::new(level::ListLevelsTool::new(directory.clone())))?;
    registry.register(Box::new(semester::CreateSemesterTool::new(directory.clone())))?;
    registry.register(Box::new(semester::ListSemestersTool::new(directory)))?;
    Ok(registry)
}
