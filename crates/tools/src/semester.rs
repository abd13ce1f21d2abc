//! Semester tools — create and list semesters within a level.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use provost_core::{Tool, ToolError};

use crate::directory::CampusDirectory;
use crate::{parse_args, to_output};

/// Creates a semester under an existing level.
pub struct CreateSemesterTool {
    directory: Arc<CampusDirectory>,
}

impl CreateSemesterTool {
    pub fn new(directory: Arc<CampusDirectory>) -> Self {
        Self { directory }
    }
}

#[derive(Debug, Deserialize)]
struct CreateSemesterArgs {
    level_id: String,
    name: String,
}

#[async_trait]
impl Tool for CreateSemesterTool {
    fn name(&self) -> &str {
        "create_semester"
    }

    fn description(&self) -> &str {
        "Create a semester (e.g. 'First Semester') under an existing level. \
         Fails if the level id is unknown or the semester name already exists in it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "level_id": {
                    "type": "string",
                    "description": "Id of the level this semester belongs to"
                },
                "name": {
                    "type": "string",
                    "description": "Semester name, e.g. 'First Semester'"
                }
            },
            "required": ["level_id", "name"]
        })
    }

    async fn handle(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: CreateSemesterArgs = parse_args(arguments)?;
        let semester = self
            .directory
            .create_semester(&args.level_id, &args.name)
            .await
            .map_err(|e| e.into_tool_error(self.name()))?;
        to_output(self.name(), &semester)
    }
}

/// Lists semesters, optionally narrowed to one level.
pub struct ListSemestersTool {
    directory: Arc<CampusDirectory>,
}

impl ListSemestersTool {
    pub fn new(directory: Arc<CampusDirectory>) -> Self {
        Self { directory }
    }
}

#[derive(Debug, Deserialize)]
struct ListSemestersArgs {
    level_id: Option<String>,
}

#[async_trait]
impl Tool for ListSemestersTool {
    fn name(&self) -> &str {
        "list_semesters"
    }

    fn description(&self) -> &str {
        "List semesters. Pass level_id to narrow the listing to one level."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "level_id": {
                    "type": "string",
                    "description": "Optional level id to filter by"
                }
            }
        })
    }

    async fn handle(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: ListSemestersArgs = parse_args(arguments)?;
        let semesters = self
            .directory
            .semesters(args.level_id.as_deref())
            .await
            .map_err(|e| e.into_tool_error(self.name()))?;
        let listed = to_output(self.name(), &semesters)?;
        Ok(json!({ "count": semesters.len(), "semesters": listed }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
