//! Append-only conversation history.
//!
//! The history is the exact context handed to the model on every iteration.
//! Turns are only ever appended, never edited or removed, so a bug report
//! can be replayed from the turn log alone: what the model saw at step k is
//! precisely the first k turns.

use serde::{Deserialize, Serialize};

use crate::error::HistoryError;
use crate::turn::{Part, Role, Turn};

/// An ordered, append-only sequence of turns belonging to one query.
///
/// `append` enforces the structural invariants:
/// - a tool turn only ever follows a model turn that requested tool calls;
/// - the tool turn's results pair 1:1, in order, with those requests;
/// - call IDs are unique within a turn;
/// - each role carries only the part kinds it owns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a turn, assigning its sequence number.
    ///
    /// Returns the assigned sequence on success. A rejected turn leaves the
    /// history untouched.
    pub fn append(&mut self, mut turn: Turn) -> Result<u64, HistoryError> {
        self.check_parts(&turn)?;
        if turn.role == Role::Tool {
            self.check_pairing(&turn)?;
        }
        let sequence = self.turns.len() as u64;
        turn.sequence = sequence;
        self.turns.push(turn);
        Ok(sequence)
    }

    /// An owned copy of the turns, safe to hand across task boundaries.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Borrow the turns in order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The role of the most recently appended turn.
    pub fn last_role(&self) -> Option<Role> {
        self.turns.last().map(|t| t.role)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Consume the history, yielding the turn log.
    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    fn check_parts(&self, turn: &Turn) -> Result<(), HistoryError> {
        let role = match turn.role {
            Role::User => "user",
            Role::Model => "model",
            Role::Tool => "tool",
        };
        if turn.parts.is_empty() {
            return Err(HistoryError::InvalidParts {
                role,
                reason: "turn has no parts".into(),
            });
        }
        for part in &turn.parts {
            let allowed = match (turn.role, part) {
                (Role::User, Part::Text { .. }) => true,
                (Role::Model, Part::Text { .. } | Part::ToolCall(_)) => true,
                (Role::Tool, Part::ToolResult(_)) => true,
                _ => false,
            };
            if !allowed {
                return Err(HistoryError::InvalidParts {
                    role,
                    reason: format!("part kind not allowed: {part:?}"),
                });
            }
        }
        if turn.role == Role::Model {
            let mut seen = Vec::new();
            for call in turn.requests() {
                if seen.contains(&call.call_id.as_str()) {
                    return Err(HistoryError::DuplicateCallId(call.call_id.clone()));
                }
                seen.push(call.call_id.as_str());
            }
        }
        Ok(())
    }

    fn check_pairing(&self, turn: &Turn) -> Result<(), HistoryError> {
        let Some(previous) = self.turns.last() else {
            return Err(HistoryError::ToolTurnOutOfPlace);
        };
        let expected: Vec<String> = previous
            .requests()
            .iter()
            .map(|call| call.call_id.clone())
            .collect();
        if previous.role != Role::Model || expected.is_empty() {
            return Err(HistoryError::ToolTurnOutOfPlace);
        }
        let got: Vec<String> = turn
            .results()
            .iter()
            .map(|result| result.call_id.clone())
            .collect();
        if expected != got {
            return Err(HistoryError::ResultPairingMismatch { expected, got });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::{ToolCallRequest, ToolResult};
    use serde_json::json;

    fn request(id: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, "create_program", json!({"name": "n", "code": "c"}))
    }

    #[test]
    fn append_assigns_monotonic_sequence() {
        let mut history = History::new();
        let s0 = history.append(Turn::user("hello")).unwrap();
        let s1 = history.append(Turn::model_answer("hi")).unwrap();
        assert_eq!((s0, s1), (0, 1));
        assert_eq!(history.turns()[1].sequence, 1);
        assert_eq!(history.last_role(), Some(Role::Model));
    }

    #[test]
    fn tool_turn_requires_preceding_requests() {
        let mut history = History::new();
        history.append(Turn::user("hello")).unwrap();

        let call = request("1");
        let results = vec![ToolResult::ok(&call, json!({"id": "p-1"}))];
        let err = history.append(Turn::tool_results(results)).unwrap_err();
        assert_eq!(err, HistoryError::ToolTurnOutOfPlace);
        // rejected turn leaves the history untouched
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn tool_turn_pairs_with_requests_in_order() {
        let mut history = History::new();
        history.append(Turn::user("hello")).unwrap();
        history
            .append(Turn::model_requests(vec![request("1"), request("2")]))
            .unwrap();

        // reversed order is a pairing violation
        let reversed = vec![
            ToolResult::ok(&request("2"), json!({})),
            ToolResult::ok(&request("1"), json!({})),
        ];
        let err = history.append(Turn::tool_results(reversed)).unwrap_err();
        assert!(matches!(err, HistoryError::ResultPairingMismatch { .. }));

        // matching order is accepted
        let ordered = vec![
            ToolResult::ok(&request("1"), json!({})),
            ToolResult::err(&request("2"), "boom"),
        ];
        history.append(Turn::tool_results(ordered)).unwrap();
        assert_eq!(history.last_role(), Some(Role::Tool));
    }

    #[test]
    fn missing_result_is_rejected() {
        let mut history = History::new();
        history.append(Turn::user("hello")).unwrap();
        history
            .append(Turn::model_requests(vec![request("1"), request("2")]))
            .unwrap();

        let partial = vec![ToolResult::ok(&request("1"), json!({}))];
        let err = history.append(Turn::tool_results(partial)).unwrap_err();
        assert_eq!(
            err,
            HistoryError::ResultPairingMismatch {
                expected: vec!["1".into(), "2".into()],
                got: vec!["1".into()],
            }
        );
    }

    #[test]
    fn duplicate_call_ids_rejected() {
        let mut history = History::new();
        let err = history
            .append(Turn::model_requests(vec![request("1"), request("1")]))
            .unwrap_err();
        assert_eq!(err, HistoryError::DuplicateCallId("1".into()));
    }

    #[test]
    fn role_part_shapes_enforced() {
        let mut history = History::new();
        let mut turn = Turn::user("hello");
        turn.parts.push(Part::ToolCall(request("1")));
        let err = history.append(turn).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidParts { role: "user", .. }));

        let empty = Turn {
            parts: Vec::new(),
            ..Turn::user("x")
        };
        assert!(history.append(empty).is_err());
    }

    #[test]
    fn snapshot_is_a_strict_prefix_across_appends() {
        let mut history = History::new();
        history.append(Turn::user("hello")).unwrap();
        let earlier = history.snapshot();

        history
            .append(Turn::model_requests(vec![request("1")]))
            .unwrap();
        let later = history.snapshot();

        assert!(later.len() > earlier.len());
        assert_eq!(&later[..earlier.len()], &earlier[..]);
    }

    #[test]
    fn snapshot_is_detached_from_later_appends() {
        let mut history = History::new();
        history.append(Turn::user("hello")).unwrap();
        let snapshot = history.snapshot();
        history.append(Turn::model_answer("hi")).unwrap();
        assert_eq!(snapshot.len(), 1);
    }
}
