//! # Provost Core
//!
//! Domain types, contracts, and error definitions for the Provost agent
//! runtime. This crate defines the model every other crate implements
//! against: turns and history, the tool registry, and the model gateway.
//!
//! ## Design Philosophy
//!
//! The orchestration loop depends only on the contracts defined here. Tool
//! implementations, the concrete model provider, and every transport live in
//! their own crates and depend inward on core. This enables:
//! - Testing the loop with scripted gateways and stub tools
//! - Swapping the provider without touching loop logic
//! - A clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod gateway;
pub mod history;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{
    Error, GatewayError, HistoryError, RegistryError, Result, ToolError, ValidationError,
    ValidationIssue,
};
pub use gateway::{ModelGateway, ModelResponse};
pub use history::History;
pub use tool::{Tool, ToolCatalogEntry, ToolRegistry};
pub use turn::{Part, QueryId, Role, ToolCallRequest, ToolOutcome, ToolResult, Turn};
