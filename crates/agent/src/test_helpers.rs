//! Shared test doubles for loop tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use provost_core::{
    GatewayError, ModelGateway, ModelResponse, Tool, ToolCallRequest, ToolCatalogEntry, ToolError,
    ToolRegistry, Turn,
};

use crate::loop_runner::{QueryError, QueryReport, QueryStream};
use crate::stream_event::QueryEvent;

/// A gateway that returns a scripted sequence of responses.
///
/// Each `ask` returns the next entry in the queue. Panics if more calls are
/// made than entries provided, so a runaway loop fails loudly.
pub struct ScriptedGateway {
    responses: Mutex<Vec<Result<ModelResponse, GatewayError>>>,
    call_count: Mutex<usize>,
}

impl ScriptedGateway {
    pub fn new(responses: Vec<Result<ModelResponse, GatewayError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
        }
    }

    /// A gateway that answers directly, never requesting tools.
    pub fn final_only(text: &str) -> Self {
        Self::new(vec![Ok(ModelResponse::Final(text.into()))])
    }

    /// A gateway that requests one round of tool calls, then answers.
    pub fn tools_then_final(calls: Vec<ToolCallRequest>, text: &str) -> Self {
        Self::new(vec![
            Ok(ModelResponse::ToolCalls(calls)),
            Ok(ModelResponse::Final(text.into())),
        ])
    }

    /// A gateway that requests the same call every round, never converging.
    pub fn always_tools(call: ToolCallRequest, rounds: usize) -> Self {
        Self::new(
            std::iter::repeat_with(|| Ok(ModelResponse::ToolCalls(vec![call.clone()])))
                .take(rounds)
                .collect(),
        )
    }

    /// How many times the model was consulted.
    pub fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn ask(
        &self,
        _history: &[Turn],
        _tools: &[ToolCatalogEntry],
        _persona: Option<&str>,
    ) -> Result<ModelResponse, GatewayError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        if *count >= responses.len() {
            panic!(
                "ScriptedGateway: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }
        let response = responses[*count].clone();
        *count += 1;
        response
    }
}

/// A gateway whose `ask` never resolves, for cancellation tests.
#[derive(Default)]
pub struct HangingGateway;

#[async_trait]
impl ModelGateway for HangingGateway {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn ask(
        &self,
        _history: &[Turn],
        _tools: &[ToolCatalogEntry],
        _persona: Option<&str>,
    ) -> Result<ModelResponse, GatewayError> {
        futures::future::pending().await
    }
}

/// A tool that succeeds after an optional delay.
pub struct StubTool {
    name: &'static str,
    delay_ms: u64,
}

impl StubTool {
    pub fn named(name: &'static str) -> Self {
        Self { name, delay_ms: 0 }
    }

    pub fn slow(name: &'static str, delay_ms: u64) -> Self {
        Self { name, delay_ms }
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "Succeeds, optionally after a delay"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object" })
    }
    async fn handle(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        Ok(json!({ "ran": self.name }))
    }
}

/// A tool whose handler always fails with a domain reason.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "failing"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object" })
    }
    async fn handle(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "failing".into(),
            reason: "records database offline".into(),
        })
    }
}

/// A tool whose handler panics mid-flight.
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "panicky"
    }
    fn description(&self) -> &str {
        "Panics when handled"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object" })
    }
    async fn handle(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        panic!("handler panicked");
    }
}

/// A registry with one well-behaved, one failing, and one panicking tool.
pub fn stub_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(StubTool::named("stub"))).unwrap();
    registry.register(Box::new(FailingTool)).unwrap();
    registry.register(Box::new(PanickingTool)).unwrap();
    registry
}

/// Collect every event a stream produces, then its outcome.
pub async fn drain(mut stream: QueryStream) -> (Vec<QueryEvent>, Result<QueryReport, QueryError>) {
    let mut events = Vec::new();
    while let Some(event) = stream.next_event().await {
        events.push(event);
    }
    let outcome = stream.finish().await;
    (events, outcome)
}
