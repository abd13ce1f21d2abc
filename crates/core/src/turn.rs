//! Turn and part domain types.
//!
//! A query is a conversation between three parties: the user who asked,
//! the model deciding what to do next, and the tools doing the work. Each
//! contribution is one `Turn`; what it carries is an ordered list of `Part`s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one query (one run of the orchestration loop).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(pub String);

impl QueryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The party that owns a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user who submitted the prompt
    User,
    /// The language model
    Model,
    /// Tool execution results
    Tool,
}

/// A request from the model to invoke one tool.
///
/// `arguments` is untyped at this layer. Validity is established only at
/// dispatch time, against the registered tool's parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call ID, unique within the originating turn
    pub call_id: String,

    /// Name of the tool to invoke
    pub tool_name: String,

    /// Arguments as a raw JSON value
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// What one tool call settled to: the value it produced, or why it failed.
///
/// A failed call is data, not an escaping error. The model sees the reason
/// on the next iteration and can adapt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutcome {
    Ok { value: serde_json::Value },
    Err { reason: String },
}

impl ToolOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ToolOutcome::Ok { .. })
    }

    /// The produced value, if the call succeeded.
    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            ToolOutcome::Ok { value } => Some(value),
            ToolOutcome::Err { .. } => None,
        }
    }

    /// The failure reason, if the call failed.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ToolOutcome::Ok { .. } => None,
            ToolOutcome::Err { reason } => Some(reason),
        }
    }
}

/// The settled result of one tool call, paired to its request by `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result answers
    pub call_id: String,

    /// Name of the tool that ran
    pub tool_name: String,

    /// How the call settled
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn ok(call: &ToolCallRequest, value: serde_json::Value) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            outcome: ToolOutcome::Ok { value },
        }
    }

    pub fn err(call: &ToolCallRequest, reason: impl Into<String>) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            outcome: ToolOutcome::Err {
                reason: reason.into(),
            },
        }
    }
}

/// One element of a turn's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    /// Natural-language text (user prompt or model answer)
    Text { text: String },
    /// A tool invocation the model requested
    ToolCall(ToolCallRequest),
    /// The settled result of one tool call
    ToolResult(ToolResult),
}

/// One atomic contribution to a conversation.
///
/// `sequence` is the turn's monotonic position in its history. It is
/// assigned by `History::append`; a freshly constructed turn carries 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who owns this turn
    pub role: Role,

    /// Ordered content
    pub parts: Vec<Part>,

    /// Monotonic position in the history
    pub sequence: u64,

    /// When this turn was created
    pub created_at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            parts,
            sequence: 0,
            created_at: Utc::now(),
        }
    }

    /// A user turn carrying the prompt text.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::Text { text: text.into() }])
    }

    /// A model turn carrying the final answer text.
    pub fn model_answer(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::Text { text: text.into() }])
    }

    /// A model turn carrying one or more tool-call requests.
    pub fn model_requests(calls: Vec<ToolCallRequest>) -> Self {
        Self::new(Role::Model, calls.into_iter().map(Part::ToolCall).collect())
    }

    /// A tool turn carrying the settled results of the preceding requests.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self::new(
            Role::Tool,
            results.into_iter().map(Part::ToolResult).collect(),
        )
    }

    /// The first text part, if any.
    pub fn text(&self) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// All tool-call requests in this turn, in part order.
    pub fn requests(&self) -> Vec<&ToolCallRequest> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    /// All tool results in this turn, in part order.
    pub fn results(&self) -> Vec<&ToolResult> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_turn_carries_text() {
        let turn = Turn::user("Create a BSC program");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.text(), Some("Create a BSC program"));
        assert!(turn.requests().is_empty());
    }

    #[test]
    fn model_request_turn_preserves_call_order() {
        let turn = Turn::model_requests(vec![
            ToolCallRequest::new("1", "create_program", json!({})),
            ToolCallRequest::new("2", "list_semesters", json!({})),
        ]);
        let ids: Vec<&str> = turn.requests().iter().map(|c| c.call_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(turn.text(), None);
    }

    #[test]
    fn outcome_accessors() {
        let ok = ToolOutcome::Ok {
            value: json!({"id": "p-1"}),
        };
        assert!(ok.is_ok());
        assert_eq!(ok.value(), Some(&json!({"id": "p-1"})));
        assert_eq!(ok.reason(), None);

        let err = ToolOutcome::Err {
            reason: "duplicate code".into(),
        };
        assert!(!err.is_ok());
        assert_eq!(err.reason(), Some("duplicate code"));
    }

    #[test]
    fn outcome_wire_encoding_is_tagged() {
        let ok = ToolOutcome::Ok {
            value: json!({"id": 7}),
        };
        let encoded = serde_json::to_value(&ok).unwrap();
        assert_eq!(encoded, json!({"status": "ok", "value": {"id": 7}}));

        let err = ToolOutcome::Err {
            reason: "boom".into(),
        };
        let encoded = serde_json::to_value(&err).unwrap();
        assert_eq!(encoded, json!({"status": "err", "reason": "boom"}));
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = Turn::model_requests(vec![ToolCallRequest::new(
            "1",
            "create_program",
            json!({"name": "Bachelor of Science", "code": "BSC"}),
        )]);
        let json = serde_json::to_string(&turn).unwrap();
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}
