//! Error types for the Provost domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; the taxonomy separates
//! recoverable tool-level failures (fed back to the model as data) from
//! fatal gateway/loop-level failures (terminal for the query).

use std::fmt;
use thiserror::Error;

/// The top-level error type for all Provost operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- History errors ---
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    // --- Registry errors ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Gateway errors ---
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Violations of the append-only history invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    #[error("A tool turn must follow a model turn that requested tool calls")]
    ToolTurnOutOfPlace,

    #[error(
        "Tool results do not pair with the preceding requests (expected [{}], got [{}])",
        .expected.join(", "),
        .got.join(", ")
    )]
    ResultPairingMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("Duplicate call ID within one turn: {0}")]
    DuplicateCallId(String),

    #[error("Turn content is not valid for role {role}: {reason}")]
    InvalidParts { role: &'static str, reason: String },
}

/// Failures while building the tool registry at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateToolName(String),

    #[error("Invalid parameter schema for tool {tool_name}: {reason}")]
    InvalidSchema { tool_name: String, reason: String },
}

/// Failures of one tool call. Always converted to an `Err` outcome at the
/// dispatch boundary, never propagated into the loop.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(#[from] ValidationError),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

/// One field-level problem found while validating tool arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// JSON pointer to the offending field ("" for the argument root)
    pub path: String,

    /// What was wrong with it
    pub reason: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "$"
        } else {
            self.path.as_str()
        };
        write!(f, "{path}: {}", self.reason)
    }
}

/// Structured schema-validation failure: every issue found, with its field
/// path. Raised at the dispatch boundary and carried as data from there on.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for issue in &self.issues {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{issue}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Failures of the model gateway. Fatal for the current query; distinguished
/// from an empty-but-successful response, which is never retried.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed model payload: {0}")]
    Malformed(String),

    #[error("Gateway not configured: {0}")]
    NotConfigured(String),
}
