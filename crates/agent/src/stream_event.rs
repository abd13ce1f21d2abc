//! Loop-internal query events.
//!
//! `QueryEvent` is the in-process vocabulary for loop transitions. It is
//! deliberately not serializable: what goes over a transport is the `Frame`
//! type in [`crate::wire`], so the wire encoding can change without touching
//! loop logic.
//!
//! Ordering contract per iteration: one `Status`, then every `ToolInvoked`
//! in request order, then the `ToolSettled`s as the calls settle (these may
//! interleave, but an invocation always precedes its own settlement), then
//! the next iteration's `Status` or a terminal `FinalAnswer`/`Error`.

use provost_core::ToolOutcome;

/// Why a query terminated without a final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The model gateway failed (network, auth, malformed payload)
    GatewayFailed,
    /// The model answered with nothing usable
    NoUsableResponse,
    /// The iteration cap was reached before the model converged
    IterationLimitExceeded,
    /// The caller cancelled the query
    Cancelled,
    /// A bug on our side (history invariant, task failure)
    Internal,
}

impl AbortReason {
    /// Stable identifier used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GatewayFailed => "gateway_failed",
            Self::NoUsableResponse => "no_usable_response",
            Self::IterationLimitExceeded => "iteration_limit_exceeded",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observable loop transition.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    /// The loop is consulting the model.
    Status { message: String },

    /// The model requested this tool call; execution is starting.
    ToolInvoked {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    /// The tool call settled, successfully or not.
    ToolSettled {
        call_id: String,
        tool_name: String,
        outcome: ToolOutcome,
    },

    /// Terminal: the model produced its final answer.
    FinalAnswer { text: String },

    /// Terminal: the query aborted.
    Error {
        reason: AbortReason,
        message: String,
    },
}

impl QueryEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::ToolInvoked { .. } => "tool_invoked",
            Self::ToolSettled { .. } => "tool_settled",
            Self::FinalAnswer { .. } => "final_answer",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. } | Self::Error { .. })
    }
}
