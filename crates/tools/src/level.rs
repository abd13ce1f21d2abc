//! Level tools — create and list study levels within a program.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use provost_core::{Tool, ToolError};

use crate::directory::CampusDirectory;
use crate::{parse_args, to_output};

/// Creates a study level under an existing program.
pub struct CreateLevelTool {
    directory: Arc<CampusDirectory>,
}

impl CreateLevelTool {
    pub fn new(directory: Arc<CampusDirectory>) -> Self {
        Self { directory }
    }
}

#[derive(Debug, Deserialize)]
struct CreateLevelArgs {
    program_id: String,
    name: String,
}

#[async_trait]
impl Tool for CreateLevelTool {
    fn name(&self) -> &str {
        "create_level"
    }

    fn description(&self) -> &str {
        "Create a study level (e.g. 'Level 100') under an existing program. \
         Fails if the program id is unknown or the level name already exists in it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "program_id": {
                    "type": "string",
                    "description": "Id of the program this level belongs to"
                },
                "name": {
                    "type": "string",
                    "description": "Level name, e.g. 'Level 100'"
                }
            },
            "required": ["program_id", "name"]
        })
    }

    async fn handle(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: CreateLevelArgs = parse_args(arguments)?;
        let level = self
            .directory
            .create_level(&args.program_id, &args.name)
            .await
            .map_err(|e| e.into_tool_error(self.name()))?;
        to_output(self.name(), &level)
    }
}

/// Lists study levels, optionally narrowed to one program.
pub struct ListLevelsTool {
    directory: Arc<CampusDirectory>,
}

impl ListLevelsTool {
    pub fn new(directory: Arc<CampusDirectory>) -> Self {
        Self { directory }
    }
}

#[derive(Debug, Deserialize)]
struct ListLevelsArgs {
    program_id: Option<String>,
}

#[async_trait]
impl Tool for ListLevelsTool {
    fn name(&self) -> &str {
        "list_levels"
    }

    fn description(&self) -> &str {
        "List study levels. Pass program_id to narrow the listing to one program."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "program_id": {
                    "type": "string",
                    "description": "Optional program id to filter by"
                }
            }
        })
    }

    async fn handle(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: ListLevelsArgs = parse_args(arguments)?;
        let levels = self
            .directory
            .levels(args.program_id.as_deref())
            .await
            .map_err(|e| e.into_tool_error(self.name()))?;
        let listed = to_output(self.name(), &levels)?;
        Ok(json!({ "count": levels.len(), "levels": listed }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
