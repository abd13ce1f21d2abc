//! Wire encoding of query events.
//!
//! One JSON object per line (NDJSON). A consumer reading the stream once,
//! in order, can reconstruct the entire interaction: which tools the model
//! requested, how each settled, and the terminal answer or error. The same
//! frames travel over HTTP chunked responses and WebSocket messages.

use provost_core::ToolOutcome;
use serde::{Deserialize, Serialize};

use crate::stream_event::QueryEvent;

/// One frame of the streaming transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// The loop is consulting the model.
    Status { message: String },

    /// A tool call is starting.
    ToolInvoked {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    /// A tool call settled.
    ToolSettled {
        call_id: String,
        tool_name: String,
        outcome: ToolOutcome,
    },

    /// Terminal: the final answer.
    FinalAnswer { text: String },

    /// Terminal: the query aborted.
    Error { reason: String, message: String },
}

impl Frame {
    /// Frame type name as it appears in the `type` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::ToolInvoked { .. } => "tool_invoked",
            Self::ToolSettled { .. } => "tool_settled",
            Self::FinalAnswer { .. } => "final_answer",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this frame ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. } | Self::Error { .. })
    }
}

impl From<QueryEvent> for Frame {
    fn from(event: QueryEvent) -> Self {
        match event {
            QueryEvent::Status { message } => Frame::Status { message },
            QueryEvent::ToolInvoked {
                call_id,
                tool_name,
                arguments,
            } => Frame::ToolInvoked {
                call_id,
                tool_name,
                arguments,
            },
            QueryEvent::ToolSettled {
                call_id,
                tool_name,
                outcome,
            } => Frame::ToolSettled {
                call_id,
                tool_name,
                outcome,
            },
            QueryEvent::FinalAnswer { text } => Frame::FinalAnswer { text },
            QueryEvent::Error { reason, message } => Frame::Error {
                reason: reason.as_str().to_string(),
                message,
            },
        }
    }
}

/// Encode one frame as a newline-terminated JSON line.
pub fn encode_line(frame: &Frame) -> String {
    let mut line = serde_json::to_string(frame).unwrap_or_default();
    line.push('\n');
    line
}

/// Decode one line back into a frame.
pub fn decode_line(line: &str) -> Result<Frame, serde_json::Error> {
    serde_json::from_str(line.trim())
}
