//! The orchestration loop implementation.
//!
//! One query runs as one spawned task driving a sequential state machine:
//!
//! 1. Check the iteration cap, then ask the model gateway.
//! 2. If the model requested tool calls: append the model turn, fan the
//!    calls out as parallel tasks, join them all, append one tool turn with
//!    the results in request order, and go back to 1.
//! 3. If the model produced a final answer: append it and finish.
//!
//! Every transition is emitted as a [`QueryEvent`]. The synchronous
//! [`AgentLoop::run_query`] is implemented on top of the streaming
//! [`AgentLoop::stream_query`], so the two modes cannot diverge.
//!
//! Failure handling follows one rule: a single tool failing is data (an
//! `Err` outcome the model sees next iteration), while gateway failures,
//! the iteration cap, and cancellation are terminal for the query.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use provost_core::{
    GatewayError, History, HistoryError, ModelGateway, ModelResponse, QueryId, ToolCallRequest,
    ToolCatalogEntry, ToolRegistry, ToolResult, Turn,
};

use crate::stream_event::{AbortReason, QueryEvent};

/// Default iteration cap protecting against runaway loops.
pub const DEFAULT_MAX_ITERATIONS: u32 = 7;

/// Why a query failed to produce a final answer.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Model gateway failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Model produced no usable response")]
    NoUsableResponse,

    #[error("Iteration limit of {limit} reached before the model converged")]
    IterationLimitExceeded { limit: u32 },

    #[error("Query cancelled by caller")]
    Cancelled,

    #[error("History rejected a turn: {0}")]
    History(#[from] HistoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// The terminal reason carried on the wire.
    pub fn reason(&self) -> AbortReason {
        match self {
            Self::Gateway(_) => AbortReason::GatewayFailed,
            Self::NoUsableResponse => AbortReason::NoUsableResponse,
            Self::IterationLimitExceeded { .. } => AbortReason::IterationLimitExceeded,
            Self::Cancelled => AbortReason::Cancelled,
            Self::History(_) | Self::Internal(_) => AbortReason::Internal,
        }
    }
}

/// What a finished query produced.
#[derive(Debug, Clone)]
pub struct QueryReport {
    /// Which query this was
    pub query_id: QueryId,

    /// The model's final answer
    pub text: String,

    /// Tool-executing iterations completed before the final answer
    pub iterations: u32,

    /// Total tool calls settled and appended
    pub tool_calls_made: usize,

    /// The full turn log, for auditing and replay
    pub turns: Vec<Turn>,
}

/// Per-query context. Created when the query starts, dropped when it ends,
/// never shared with any other query.
struct LoopState {
    history: History,
    iterations: u32,
    max_iterations: u32,
    tool_calls_made: usize,
}

impl LoopState {
    fn new(max_iterations: u32) -> Self {
        Self {
            history: History::new(),
            iterations: 0,
            max_iterations,
            tool_calls_made: 0,
        }
    }
}

/// Emits loop transitions to the caller. Pure projection: it decides
/// nothing, it only forwards. A send error means the caller stopped
/// listening, which is not the loop's problem; cancellation has its own
/// channel.
#[derive(Clone)]
struct EventSink {
    tx: mpsc::Sender<QueryEvent>,
}

impl EventSink {
    async fn emit(&self, event: QueryEvent) {
        debug!(event = event.kind(), "query event");
        let _ = self.tx.send(event).await;
    }
}

/// A live query: its event stream, its cancellation handle, and its
/// eventual outcome.
///
/// Dropping the stream cancels the query, so a disconnected client stops
/// scheduling further model calls. In-flight tool calls still settle; their
/// results are discarded rather than appended.
pub struct QueryStream {
    query_id: QueryId,
    events: mpsc::Receiver<QueryEvent>,
    handle: JoinHandle<Result<QueryReport, QueryError>>,
    cancel: CancellationToken,
    abort_on_drop: DropGuard,
}

impl QueryStream {
    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    /// Request cancellation. The loop stops at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token observers can use to watch for cancellation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event, or `None` once the loop has finished.
    pub async fn next_event(&mut self) -> Option<QueryEvent> {
        self.events.recv().await
    }

    /// Wait for the query to finish and return its outcome.
    ///
    /// Drains any unread events first so the loop task is never left
    /// blocked on a full channel.
    pub async fn finish(self) -> Result<QueryReport, QueryError> {
        let QueryStream {
            query_id: _,
            mut events,
            handle,
            cancel: _,
            abort_on_drop: guard,
        } = self;
        while events.recv().await.is_some() {}
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(QueryError::Internal(format!("query task failed: {e}"))),
        };
        drop(guard);
        outcome
    }
}

impl Stream for QueryStream {
    type Item = QueryEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<QueryEvent>> {
        self.get_mut().events.poll_recv(cx)
    }
}

/// The orchestration loop, configured once and shared across queries.
///
/// Holds only immutable collaborators, so one instance serves any number
/// of concurrent queries; all per-query state lives in the query's own
/// task.
pub struct AgentLoop {
    /// The model gateway
    gateway: Arc<dyn ModelGateway>,

    /// The tool catalog, immutable after startup
    tools: Arc<ToolRegistry>,

    /// Persona / system directive handed to the gateway
    persona: Option<String>,

    /// Hard cap on tool-executing iterations per query
    max_iterations: u32,
}

impl AgentLoop {
    /// Create a new loop over a gateway and a tool registry.
    pub fn new(gateway: Arc<dyn ModelGateway>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            gateway,
            tools,
            persona: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set the persona / system directive.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Start a query, streaming every loop transition.
    ///
    /// The loop runs in its own task; the returned handle yields events as
    /// they happen and the outcome at the end.
    pub fn stream_query(&self, prompt: impl Into<String>) -> QueryStream {
        let (tx, rx) = mpsc::channel::<QueryEvent>(128);
        let cancel = CancellationToken::new();
        let query_id = QueryId::new();

        let task = QueryTask {
            query_id: query_id.clone(),
            gateway: self.gateway.clone(),
            tools: self.tools.clone(),
            persona: self.persona.clone(),
            prompt: prompt.into(),
            max_iterations: self.max_iterations,
            sink: EventSink { tx },
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.drive());

        QueryStream {
            query_id,
            events: rx,
            handle,
            cancel: cancel.clone(),
            abort_on_drop: cancel.drop_guard(),
        }
    }

    /// Run a query to completion and return only the outcome.
    ///
    /// Consumes the same event stream as [`stream_query`] and keeps only
    /// the terminal value, so the two modes share one implementation.
    ///
    /// [`stream_query`]: AgentLoop::stream_query
    pub async fn run_query(
        &self,
        prompt: impl Into<String>,
    ) -> Result<QueryReport, QueryError> {
        let stream = self.stream_query(prompt);
        stream.finish().await
    }
}

/// Everything one query's task owns. Built by `stream_query`, moved into
/// the spawned task, dropped when the query ends.
struct QueryTask {
    query_id: QueryId,
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<ToolRegistry>,
    persona: Option<String>,
    prompt: String,
    max_iterations: u32,
    sink: EventSink,
    cancel: CancellationToken,
}

impl QueryTask {
    /// Run the query end to end, then emit the terminal event.
    async fn drive(self) -> Result<QueryReport, QueryError> {
        info!(query_id = %self.query_id, max_iterations = self.max_iterations, "query starting");

        let outcome = self.run_loop().await;

        match &outcome {
            Ok(report) => {
                info!(
                    query_id = %self.query_id,
                    iterations = report.iterations,
                    tool_calls = report.tool_calls_made,
                    "query finished"
                );
                self.sink
                    .emit(QueryEvent::FinalAnswer {
                        text: report.text.clone(),
                    })
                    .await;
            }
            Err(e) => {
                warn!(query_id = %self.query_id, reason = %e.reason(), error = %e, "query aborted");
                self.sink
                    .emit(QueryEvent::Error {
                        reason: e.reason(),
                        message: e.to_string(),
                    })
                    .await;
            }
        }

        outcome
    }

    async fn run_loop(&self) -> Result<QueryReport, QueryError> {
        let mut state = LoopState::new(self.max_iterations);
        state.history.append(Turn::user(self.prompt.clone()))?;
        let catalog: Vec<ToolCatalogEntry> = self.tools.catalog();

        loop {
            if self.cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }
            if state.iterations >= state.max_iterations {
                return Err(QueryError::IterationLimitExceeded {
                    limit: state.max_iterations,
                });
            }

            self.sink
                .emit(QueryEvent::Status {
                    message: format!(
                        "consulting model (iteration {} of {})",
                        state.iterations + 1,
                        state.max_iterations
                    ),
                })
                .await;

            debug!(
                query_id = %self.query_id,
                iteration = state.iterations,
                turns = state.history.len(),
                "asking gateway"
            );

            let ask = self
                .gateway
                .ask(state.history.turns(), &catalog, self.persona.as_deref());
            let response = tokio::select! {
                _ = self.cancel.cancelled() => return Err(QueryError::Cancelled),
                response = ask => response?,
            };

            match response {
                ModelResponse::Final(text) => {
                    state.history.append(Turn::model_answer(text.clone()))?;
                    return Ok(QueryReport {
                        query_id: self.query_id.clone(),
                        text,
                        iterations: state.iterations,
                        tool_calls_made: state.tool_calls_made,
                        turns: state.history.into_turns(),
                    });
                }
                ModelResponse::Empty => {
                    return Err(QueryError::NoUsableResponse);
                }
                ModelResponse::ToolCalls(calls) => {
                    if calls.is_empty() {
                        return Err(QueryError::NoUsableResponse);
                    }
                    state.history.append(Turn::model_requests(calls.clone()))?;

                    for call in &calls {
                        self.sink
                            .emit(QueryEvent::ToolInvoked {
                                call_id: call.call_id.clone(),
                                tool_name: call.tool_name.clone(),
                                arguments: call.arguments.clone(),
                            })
                            .await;
                    }

                    let results = self.execute_calls(&calls).await;

                    // A cancellation that raced the tool turn: the calls were
                    // allowed to settle, but their results are discarded and
                    // the abandoned history is never extended.
                    if self.cancel.is_cancelled() {
                        return Err(QueryError::Cancelled);
                    }

                    state.tool_calls_made += results.len();
                    state.history.append(Turn::tool_results(results))?;
                    state.iterations += 1;
                }
            }
        }
    }

    /// Fan out one turn's calls as independent tasks and join them all.
    ///
    /// Results come back in request order regardless of completion timing.
    /// `ToolSettled` events are emitted as each call settles, so they may
    /// interleave. A panicking handler settles its call as an `Err` outcome
    /// instead of taking the query down.
    async fn execute_calls(&self, calls: &[ToolCallRequest]) -> Vec<ToolResult> {
        let handles: Vec<JoinHandle<ToolResult>> = calls
            .iter()
            .map(|call| {
                let registry = self.tools.clone();
                let sink = self.sink.clone();
                let call = call.clone();
                tokio::spawn(async move {
                    let result = registry.invoke(&call).await;
                    sink.emit(QueryEvent::ToolSettled {
                        call_id: result.call_id.clone(),
                        tool_name: result.tool_name.clone(),
                        outcome: result.outcome.clone(),
                    })
                    .await;
                    result
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (handle, call) in handles.into_iter().zip(calls) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(call_id = %call.call_id, tool = %call.tool_name, "tool task panicked");
                    let result = ToolResult::err(call, format!("tool handler panicked: {e}"));
                    self.sink
                        .emit(QueryEvent::ToolSettled {
                            call_id: result.call_id.clone(),
                            tool_name: result.tool_name.clone(),
                            outcome: result.outcome.clone(),
                        })
                        .await;
                    results.push(result);
                }
            }
        }
        results
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use provost_core::{Part, Role, ToolOutcome};
    use serde_json::json;
    use std::time::Duration;

    fn loop_over(gateway: Arc<ScriptedGateway>, tools: ToolRegistry) -> AgentLoop {
        AgentLoop::new(gateway, Arc::new(tools))
    }

    #[tokio::test]
    async fn final_answer_without_tools() {
        let gateway = Arc::new(ScriptedGateway::final_only("Good afternoon."));
        let agent = loop_over(gateway.clone(), stub_registry());

        let report = agent.run_query("Greet me").await.unwrap();
        assert_eq!(report.text, "Good afternoon.");
        assert_eq!(report.iterations, 0);
        assert_eq!(report.tool_calls_made, 0);
        assert_eq!(gateway.calls(), 1);

        // user turn then model turn, sequences assigned in order
        assert_eq!(report.turns.len(), 2);
        assert_eq!(report.turns[0].role, Role::User);
        assert_eq!(report.turns[1].role, Role::Model);
        let sequences: Vec<u64> = report.turns.iter().map(|t| t.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
    }

    #[tokio::test]
    async fn create_program_scenario() {
        let directory = Arc::new(provost_tools::CampusDirectory::new());
        let registry = provost_tools::default_registry(directory).unwrap();
        let gateway = Arc::new(ScriptedGateway::tools_then_final(
            vec![ToolCallRequest::new(
                "1",
                "create_program",
                json!({"name": "Bachelor of Science", "code": "BSC"}),
            )],
            "Created program BSC.",
        ));
        let agent = AgentLoop::new(gateway.clone(), Arc::new(registry));

        let report = agent.run_query("Create a BSC program").await.unwrap();
        assert_eq!(report.text, "Created program BSC.");
        assert_eq!(gateway.calls(), 2);
        assert_eq!(report.tool_calls_made, 1);
        assert_eq!(report.iterations, 1);

        // one tool turn with an Ok({id}) result paired to call "1"
        let tool_turn = report
            .turns
            .iter()
            .find(|t| t.role == Role::Tool)
            .expect("tool turn");
        let results = tool_turn.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].call_id, "1");
        let value = results[0].outcome.value().expect("ok outcome");
        assert!(value["id"].is_string());
    }

    #[tokio::test]
    async fn concurrent_results_keep_request_order() {
        // the first request is the slowest, so completion order is reversed
        let mut registry = ToolRegistry::new();
        registry
            .register(Box::new(StubTool::slow("slow_audit", 50)))
            .unwrap();
        registry.register(Box::new(StubTool::named("fast_list"))).unwrap();

        let gateway = Arc::new(ScriptedGateway::tools_then_final(
            vec![
                ToolCallRequest::new("1", "slow_audit", json!({})),
                ToolCallRequest::new("2", "fast_list", json!({})),
            ],
            "done",
        ));
        let agent = loop_over(gateway, registry);

        let (events, outcome) = drain(agent.stream_query("run both")).await;
        let report = outcome.unwrap();

        let tool_turn = report
            .turns
            .iter()
            .find(|t| t.role == Role::Tool)
            .expect("tool turn");
        let result_ids: Vec<&str> = tool_turn
            .results()
            .iter()
            .map(|r| r.call_id.as_str())
            .collect();
        assert_eq!(result_ids, vec!["1", "2"], "request order must be kept");

        // invocations in request order, settlements in completion order
        let invoked: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                QueryEvent::ToolInvoked { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect();
        let settled: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                QueryEvent::ToolSettled { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(invoked, vec!["1", "2"]);
        assert_eq!(settled, vec!["2", "1"], "fast call settles first");

        // every invocation precedes its own settlement
        for id in ["1", "2"] {
            let invoked_at = events
                .iter()
                .position(|e| matches!(e, QueryEvent::ToolInvoked { call_id, .. } if call_id == id))
                .unwrap();
            let settled_at = events
                .iter()
                .position(|e| matches!(e, QueryEvent::ToolSettled { call_id, .. } if call_id == id))
                .unwrap();
            assert!(invoked_at < settled_at);
        }
    }

    #[tokio::test]
    async fn failing_tool_keeps_loop_alive() {
        let gateway = Arc::new(ScriptedGateway::tools_then_final(
            vec![ToolCallRequest::new("1", "failing", json!({}))],
            "recovered",
        ));
        let agent = loop_over(gateway.clone(), stub_registry());

        let report = agent.run_query("try it").await.unwrap();
        assert_eq!(report.text, "recovered");
        assert_eq!(gateway.calls(), 2);

        let tool_turn = report
            .turns
            .iter()
            .find(|t| t.role == Role::Tool)
            .expect("tool turn");
        let reason = tool_turn.results()[0].outcome.reason().unwrap();
        assert!(
            reason.contains("records database offline"),
            "original failure reason must be preserved, got: {reason}"
        )
    }

    #[tokio::test]
    async fn unknown_tool_becomes_err_outcome() {
        let gateway = Arc::new(ScriptedGateway::tools_then_final(
            vec![ToolCallRequest::new("1", "enroll_student", json!({}))],
            "no such tool, sorry",
        ));
        let agent = loop_over(gateway.clone(), stub_registry());

        let report = agent.run_query("enroll someone").await.unwrap();
        assert_eq!(gateway.calls(), 2, "loop continues after the unknown tool");
        let tool_turn = report
            .turns
            .iter()
            .find(|t| t.role == Role::Tool)
            .expect("tool turn");
        let reason = tool_turn.results()[0].outcome.reason().unwrap();
        assert!(reason.contains("enroll_student"));
    }

    #[tokio::test]
    async fn panicking_tool_settles_as_err() {
        let gateway = Arc::new(ScriptedGateway::tools_then_final(
            vec![
                ToolCallRequest::new("1", "panicky", json!({})),
                ToolCallRequest::new("2", "stub", json!({})),
            ],
            "survived",
        ));
        let agent = loop_over(gateway, stub_registry());

        let report = agent.run_query("push through").await.unwrap();
        assert_eq!(report.text, "survived");

        let tool_turn = report
            .turns
            .iter()
            .find(|t| t.role == Role::Tool)
            .expect("tool turn");
        let results = tool_turn.results();
        assert_eq!(results.len(), 2);
        assert!(results[0].outcome.reason().unwrap().contains("panicked"));
        assert!(results[1].outcome.is_ok(), "sibling call is unaffected");
    }

    #[tokio::test]
    async fn gateway_failure_aborts_before_dispatch() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Err(GatewayError::Network(
            "connection refused".into(),
        ))]));
        let agent = loop_over(gateway, stub_registry());

        let (events, outcome) = drain(agent.stream_query("hello")).await;
        let err = outcome.unwrap_err();
        assert!(matches!(err, QueryError::Gateway(_)));

        // no tool was invoked for the failed iteration
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, QueryEvent::ToolInvoked { .. })),
        );
        match events.last().unwrap() {
            QueryEvent::Error { reason, message } => {
                assert_eq!(*reason, AbortReason::GatewayFailed);
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected terminal error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_response_is_terminal() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(ModelResponse::Empty)]));
        let agent = loop_over(gateway.clone(), stub_registry());

        let err = agent.run_query("hello").await.unwrap_err();
        assert!(matches!(err, QueryError::NoUsableResponse));
        assert_eq!(gateway.calls(), 1, "empty responses are never retried");
    }

    #[tokio::test]
    async fn empty_call_list_is_unusable() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(ModelResponse::ToolCalls(
            vec![],
        ))]));
        let agent = loop_over(gateway, stub_registry());

        let err = agent.run_query("hello").await.unwrap_err();
        assert!(matches!(err, QueryError::NoUsableResponse));
    }

    #[tokio::test]
    async fn iteration_cap_stops_runaway_loop() {
        let gateway = Arc::new(ScriptedGateway::always_tools(
            ToolCallRequest::new("1", "stub", json!({})),
            10,
        ));
        let agent = loop_over(gateway.clone(), stub_registry()).with_max_iterations(3);

        let (events, outcome) = drain(agent.stream_query("never converges")).await;
        let err = outcome.unwrap_err();
        assert!(matches!(
            err,
            QueryError::IterationLimitExceeded { limit: 3 }
        ));
        assert_eq!(gateway.calls(), 3, "exactly max_iterations gateway calls");

        match events.last().unwrap() {
            QueryEvent::Error { reason, .. } => {
                assert_eq!(*reason, AbortReason::IterationLimitExceeded)
            }
            other => panic!("expected terminal error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn streaming_and_sync_agree() {
        let script = || {
            Arc::new(ScriptedGateway::tools_then_final(
                vec![ToolCallRequest::new("1", "stub", json!({}))],
                "both modes see this",
            ))
        };

        let sync_report = loop_over(script(), stub_registry())
            .run_query("compare")
            .await
            .unwrap();

        let (events, stream_outcome) =
            drain(loop_over(script(), stub_registry()).stream_query("compare")).await;
        let stream_report = stream_outcome.unwrap();

        assert_eq!(sync_report.text, stream_report.text);
        match events.last().unwrap() {
            QueryEvent::FinalAnswer { text } => assert_eq!(*text, sync_report.text),
            other => panic!("expected final answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn turn_log_grows_append_only() {
        let gateway = Arc::new(ScriptedGateway::tools_then_final(
            vec![ToolCallRequest::new("1", "stub", json!({}))],
            "done",
        ));
        let agent = loop_over(gateway, stub_registry());

        let report = agent.run_query("audit me").await.unwrap();
        // user, model(requests), tool(results), model(answer)
        assert_eq!(report.turns.len(), 4);
        for (i, turn) in report.turns.iter().enumerate() {
            assert_eq!(turn.sequence, i as u64);
        }
        // every tool turn pairs with the requests right before it
        for window in report.turns.windows(2) {
            if window[1].role == Role::Tool {
                let requested: Vec<&str> = window[0]
                    .requests()
                    .iter()
                    .map(|c| c.call_id.as_str())
                    .collect();
                let settled: Vec<&str> = window[1]
                    .results()
                    .iter()
                    .map(|r| r.call_id.as_str())
                    .collect();
                assert_eq!(requested, settled);
            }
        }
    }

    #[tokio::test]
    async fn cancel_stops_scheduling_model_calls() {
        let gateway = Arc::new(HangingGateway::default());
        let agent = AgentLoop::new(gateway, Arc::new(stub_registry()));

        let stream = agent.stream_query("never answers");
        tokio::time::sleep(Duration::from_millis(20)).await;
        stream.cancel();

        let err = stream.finish().await.unwrap_err();
        assert!(matches!(err, QueryError::Cancelled));
    }

    #[tokio::test]
    async fn cancelled_mid_tools_discards_results() {
        // the tool takes long enough that we can cancel while it runs
        let mut registry = ToolRegistry::new();
        registry
            .register(Box::new(StubTool::slow("slow_audit", 80)))
            .unwrap();
        let gateway = Arc::new(ScriptedGateway::always_tools(
            ToolCallRequest::new("1", "slow_audit", json!({})),
            10,
        ));
        let agent = AgentLoop::new(gateway, Arc::new(registry));

        let mut stream = agent.stream_query("slow work");
        // wait until the call is in flight
        loop {
            match stream.next_event().await {
                Some(QueryEvent::ToolInvoked { .. }) => break,
                Some(_) => continue,
                None => panic!("stream ended early"),
            }
        }
        stream.cancel();

        let err = stream.finish().await.unwrap_err();
        assert!(matches!(err, QueryError::Cancelled));
    }

    #[tokio::test]
    async fn dropping_the_stream_cancels() {
        let gateway = Arc::new(HangingGateway::default());
        let agent = AgentLoop::new(gateway, Arc::new(stub_registry()));

        let stream = agent.stream_query("abandoned");
        let token = stream.cancellation_token();
        assert!(!token.is_cancelled());

        drop(stream);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn status_precedes_each_iteration() {
        let gateway = Arc::new(ScriptedGateway::tools_then_final(
            vec![ToolCallRequest::new("1", "stub", json!({}))],
            "done",
        ));
        let agent = loop_over(gateway, stub_registry());

        let (events, _) = drain(agent.stream_query("go")).await;
        assert!(matches!(events[0], QueryEvent::Status { .. }));
        let statuses = events
            .iter()
            .filter(|e| matches!(e, QueryEvent::Status { .. }))
            .count();
        assert_eq!(statuses, 2, "one status per gateway consultation");
    }

    #[test]
    fn model_turn_part_shapes() {
        // the loop builds model turns from the response variants; check the
        // part shapes it relies on
        let answer = Turn::model_answer("hi");
        assert!(matches!(answer.parts[0], Part::Text { .. }));
        let requests = Turn::model_requests(vec![ToolCallRequest::new("1", "t", json!({}))]);
        assert!(matches!(requests.parts[0], Part::ToolCall(_)));
        let outcome = ToolOutcome::Ok { value: json!(1) };
        assert!(outcome.is_ok());
    }
}
