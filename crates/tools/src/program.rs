//! Program tools — create and list academic programs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use provost_core::{Tool, ToolError};

use crate::directory::CampusDirectory;
use crate::{parse_args, to_output};

/// Creates a new academic program in the campus directory.
pub struct CreateProgramTool {
    directory: Arc<CampusDirectory>,
}

impl CreateProgramTool {
    pub fn new(directory: Arc<CampusDirectory>) -> Self {
        Self { directory }
    }
}

#[derive(Debug, Deserialize)]
struct CreateProgramArgs {
    name: String,
    code: String,
}

#[async_trait]
impl Tool for CreateProgramTool {
    fn name(&self) -> &str {
        "create_program"
    }

    fn description(&self) -> &str {
        "Create a new academic program. Fails if a program with the same code already exists."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Full program name, e.g. 'Bachelor of Science'"
                },
                "code": {
                    "type": "string",
                    "description": "Short unique program code, e.g. 'BSC'"
                }
            },
            "required": ["name", "code"]
        })
    }

    async fn handle(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: CreateProgramArgs = parse_args(arguments)?;
        let program = self
            .directory
            .create_program(&args.name, &args.code)
            .await
            .map_err(|e| e.into_tool_error(self.name()))?;
        to_output(self.name(), &program)
    }
}

/// Lists every academic program in the campus directory.
pub struct ListProgramsTool {
    directory: Arc<CampusDirectory>,
}

impl ListProgramsTool {
    pub fn new(directory: Arc<CampusDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for ListProgramsTool {
    fn name(&self) -> &str {
        "list_programs"
    }

    fn description(&self) -> &str {
        "List all academic programs, with their ids and codes."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn handle(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let programs = self.directory.programs().await;
        let listed = to_output(self.name(), &programs)?;
        Ok(json!({ "count": programs.len(), "programs": listed }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
