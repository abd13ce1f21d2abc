//! In-memory campus records backing the administrative tools.
//!
//! The hierarchy is programs → levels → semesters: a program ("Bachelor of
//! Science") owns its levels ("Level 100"), and each level owns its
//! semesters ("First Semester"). One `CampusDirectory` is built at startup
//! and shared behind an `Arc` by every tool that operates on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use provost_core::ToolError;

/// An academic program, identified by a unique short code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub name: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

/// A study level within a program, e.g. "Level 100".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub id: String,
    pub program_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A semester within a level, e.g. "First Semester".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Semester {
    pub id: String,
    pub level_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Domain failures raised by directory operations.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("A program with code '{0}' already exists")]
    DuplicateProgramCode(String),

    #[error("No program with id '{0}'")]
    UnknownProgram(String),

    #[error("Level '{name}' already exists in program '{program_id}'")]
    DuplicateLevel { program_id: String, name: String },

    #[error("No level with id '{0}'")]
    UnknownLevel(String),

    #[error("Semester '{name}' already exists in level '{level_id}'")]
    DuplicateSemester { level_id: String, name: String },
}

impl DirectoryError {
    /// Render this domain failure at the dispatch boundary.
    pub fn into_tool_error(self, tool_name: &str) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason: self.to_string(),
        }
    }
}

#[derive(Default)]
struct DirectoryState {
    programs: Vec<Program>,
    levels: Vec<Level>,
    semesters: Vec<Semester>,
}

/// The campus record store. All reads and writes go through one lock, so
/// concurrent tool calls observe a consistent view.
pub struct CampusDirectory {
    state: RwLock<DirectoryState>,
}

impl CampusDirectory {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
        }
    }

    /// Create a program. Codes are unique, compared case-insensitively.
    pub async fn create_program(&self, name: &str, code: &str) -> Result<Program, DirectoryError> {
        let mut state = self.state.write().await;
        if state
            .programs
            .iter()
            .any(|p| p.code.eq_ignore_ascii_case(code))
        {
            return Err(DirectoryError::DuplicateProgramCode(code.to_string()));
        }
        let program = Program {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            code: code.to_string(),
            created_at: Utc::now(),
        };
        info!(program_id = %program.id, code = %program.code, "program created");
        state.programs.push(program.clone());
        Ok(program)
    }

    /// All programs, in creation order.
    pub async fn programs(&self) -> Vec<Program> {
        self.state.read().await.programs.clone()
    }

    /// Create a level under an existing program. Level names are unique
    /// within their program.
    pub async fn create_level(
        &self,
        program_id: &str,
        name: &str,
    ) -> Result<Level, DirectoryError> {
        let mut state = self.state.write().await;
        if !state.programs.iter().any(|p| p.id == program_id) {
            return Err(DirectoryError::UnknownProgram(program_id.to_string()));
        }
        if state
            .levels
            .iter()
            .any(|l| l.program_id == program_id && l.name.eq_ignore_ascii_case(name))
        {
            return Err(DirectoryError::DuplicateLevel {
                program_id: program_id.to_string(),
                name: name.to_string(),
            });
        }
        let level = Level {
            id: Uuid::new_v4().to_string(),
            program_id: program_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        info!(level_id = %level.id, program_id = %level.program_id, "level created");
        state.levels.push(level.clone());
        Ok(level)
    }

    /// Levels, optionally narrowed to one program. Naming an unknown
    /// program is an error rather than an empty list.
    pub async fn levels(&self, program_id: Option<&str>) -> Result<Vec<Level>, DirectoryError> {
        let state = self.state.read().await;
        match program_id {
            Some(program_id) => {
                if !state.programs.iter().any(|p| p.id == program_id) {
                    return Err(DirectoryError::UnknownProgram(program_id.to_string()));
                }
                Ok(state
                    .levels
                    .iter()
                    .filter(|l| l.program_id == program_id)
                    .cloned()
                    .collect())
            }
            None => Ok(state.levels.clone()),
        }
    }

    /// Create a semester under an existing level. Semester names are unique
    /// within their level.
    pub async fn create_semester(
        &self,
        level_id: &str,
        name: &str,
    ) -> Result<Semester, DirectoryError> {
        let mut state = self.state.write().await;
        if !state.levels.iter().any(|l| l.id == level_id) {
            return Err(DirectoryError::UnknownLevel(level_id.to_string()));
        }
        if state
            .semesters
            .iter()
            .any(|s| s.level_id == level_id && s.name.eq_ignore_ascii_case(name))
        {
            return Err(DirectoryError::DuplicateSemester {
                level_id: level_id.to_string(),
                name: name.to_string(),
            });
        }
        let semester = Semester {
            id: Uuid::new_v4().to_string(),
            level_id: level_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        info!(semester_id = %semester.id, level_id = %semester.level_id, "semester created");
        state.semesters.push(semester.clone());
        Ok(semester)
    }

    /// Semesters, optionally narrowed to one level.
    pub async fn semesters(&self, level_id: Option<&str>) -> Result<Vec<Semester>, DirectoryError> {
        let state = self.state.read().await;
        match level_id {
            Some(level_id) => {
                if !state.levels.iter().any(|l| l.id == level_id) {
                    return Err(DirectoryError::UnknownLevel(level_id.to_string()));
                }
                Ok(state
                    .semesters
                    .iter()
                    .filter(|s| s.level_id == level_id)
                    .cloned()
                    .collect())
            }
            None => Ok(state.semesters.clone()),
        }
    }
}

impl Default for CampusDirectory {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
