//! The orchestration loop — the heart of Provost.
//!
//! A query follows an **Ask → Dispatch → Observe** cycle:
//!
//! 1. **Seed** the turn log with the user's prompt
//! 2. **Ask** the model gateway, advertising the tool catalog
//! 3. **If tool calls**: fan them out, join the results, append one tool
//!    turn, loop back to step 2
//! 4. **If a final answer**: append it and finish
//!
//! The loop continues until the model answers, the iteration cap is hit, or
//! the query is cancelled. Every transition streams out as a [`QueryEvent`];
//! the synchronous entry point consumes the same stream, so the two modes
//! cannot drift apart.

pub mod loop_runner;
pub mod stream_event;
pub mod wire;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use loop_runner::{
    AgentLoop, QueryError, QueryReport, QueryStream, DEFAULT_MAX_ITERATIONS,
};
pub use stream_event::{AbortReason, QueryEvent};
pub use wire::{decode_line, encode_line, Frame};
