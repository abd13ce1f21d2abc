//! Model gateway contract — the abstraction over the external model.
//!
//! The loop never talks to a provider directly. It depends on this trait
//! alone: given the history so far, the tool catalog, and an optional
//! persona directive, the gateway returns the model's next step.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::tool::ToolCatalogEntry;
use crate::turn::{ToolCallRequest, Turn};

/// The model's next step for a query.
///
/// `Empty` is not an error: the provider answered, but with nothing usable.
/// It is terminal and never retried, unlike a `GatewayError`, which a caller
/// may choose to retry.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// The model wants one or more tools executed before it can answer.
    /// The calls form a single conceptual turn and run independently.
    ToolCalls(Vec<ToolCallRequest>),

    /// The model produced its final answer.
    Final(String),

    /// The model produced no usable content.
    Empty,
}

/// The external language-model capability.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Gateway name for logs (e.g., "openai-compat").
    fn name(&self) -> &str;

    /// Ask the model for its next step given the conversation so far.
    async fn ask(
        &self,
        history: &[Turn],
        tools: &[ToolCatalogEntry],
        persona: Option<&str>,
    ) -> std::result::Result<ModelResponse, GatewayError>;
}
