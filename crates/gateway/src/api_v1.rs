//! HTTP API v1 — query and catalog endpoints.
//!
//! Endpoints:
//!
//! - `POST /v1/query`        — Run a query to completion, get the outcome as JSON
//! - `POST /v1/query/stream` — Run a query, receive NDJSON frames as it progresses
//! - `GET  /v1/ws`           — WebSocket: prompts in, frames out
//! - `GET  /v1/tools`        — List the tool catalog

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    http::{StatusCode, header},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use provost_agent::{AbortReason, AgentLoop, Frame, encode_line};
use provost_core::ToolRegistry;

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiState {
    /// The orchestration loop, shared across every request.
    pub agent: Arc<AgentLoop>,

    /// The registry backing `/v1/tools`. Same instance the loop dispatches
    /// against, so the catalog never drifts from what actually runs.
    pub tools: Arc<ToolRegistry>,
}

pub type SharedApiState = Arc<ApiState>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/query", post(query_handler))
        .route("/query/stream", post(query_stream_handler))
        .route("/ws", get(ws_handler))
        .route("/tools", get(list_tools_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct QueryRequest {
    prompt: String,
}

#[derive(Serialize, Deserialize)]
struct QueryResponse {
    query_id: String,
    answer: String,
    /// Tool-executing iterations the loop ran before the final answer.
    iterations: u32,
    /// Tool calls settled across those iterations.
    tool_calls: usize,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    reason: String,
}

#[derive(Serialize, Deserialize)]
struct ToolListResponse {
    count: usize,
    tools: Vec<ToolDto>,
}

#[derive(Serialize, Deserialize)]
struct ToolDto {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
            reason: "bad_request".into(),
        }),
    )
}

/// HTTP status for a query that aborted.
fn abort_status(reason: AbortReason) -> StatusCode {
    match reason {
        AbortReason::GatewayFailed | AbortReason::NoUsableResponse => StatusCode::BAD_GATEWAY,
        AbortReason::IterationLimitExceeded => StatusCode::UNPROCESSABLE_ENTITY,
        AbortReason::Cancelled | AbortReason::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ── Synchronous query ─────────────────────────────────────────────────────

/// `POST /v1/query` — Run a query to completion and return the outcome.
async fn query_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, Json<ErrorResponse>)> {
    if payload.prompt.trim().is_empty() {
        return Err(bad_request("prompt must not be empty"));
    }

    info!(prompt_len = payload.prompt.len(), "v1/query request");

    match state.agent.run_query(payload.prompt).await {
        Ok(report) => Ok(Json(QueryResponse {
            query_id: report.query_id.to_string(),
            answer: report.text,
            iterations: report.iterations,
            tool_calls: report.tool_calls_made,
        })),
        Err(e) => Err((
            abort_status(e.reason()),
            Json(ErrorResponse {
                error: e.to_string(),
                reason: e.reason().to_string(),
            }),
        )),
    }
}

// ── NDJSON streaming ──────────────────────────────────────────────────────

/// `POST /v1/query/stream` — Run a query and stream its frames as NDJSON.
///
/// One frame per line, final frame terminal. The connection closing drops
/// the stream, which cancels the query, so a disconnected client stops
/// scheduling model calls.
async fn query_stream_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    if payload.prompt.trim().is_empty() {
        return Err(bad_request("prompt must not be empty"));
    }

    let stream = state.agent.stream_query(payload.prompt);
    info!(query_id = %stream.query_id(), "v1/query/stream request");

    let lines = stream.map(|event| Ok::<_, Infallible>(encode_line(&Frame::from(event))));

    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    ))
}

// ── WebSocket ─────────────────────────────────────────────────────────────

/// `GET /v1/ws` — Bidirectional streaming over one connection.
///
/// Protocol:
/// - Client → Server: `{ "type": "query", "prompt": "..." }`
/// - Server → Client: wire frames (status, tool_invoked, tool_settled,
///   final_answer, error), one JSON object per message
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedApiState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// WebSocket message from the client.
#[derive(Deserialize)]
struct WsClientMessage {
    #[serde(rename = "type")]
    msg_type: String,
    prompt: String,
}

async fn handle_ws_connection(mut socket: WebSocket, state: SharedApiState) {
    info!("WebSocket connection established");

    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue, // ignore binary, ping, pong
            Err(_) => break,
        };

        let client_msg: WsClientMessage = match serde_json::from_str(&msg) {
            Ok(m) => m,
            Err(e) => {
                let frame = Frame::Error {
                    reason: "bad_request".into(),
                    message: format!("invalid message: {e}"),
                };
                if send_frame(&mut socket, &frame).await.is_err() {
                    return;
                }
                continue;
            }
        };

        if client_msg.msg_type != "query" {
            let frame = Frame::Error {
                reason: "bad_request".into(),
                message: format!("unknown message type: '{}'", client_msg.msg_type),
            };
            if send_frame(&mut socket, &frame).await.is_err() {
                return;
            }
            continue;
        }

        let mut stream = state.agent.stream_query(client_msg.prompt);
        while let Some(event) = stream.next_event().await {
            let frame = Frame::from(event);
            if send_frame(&mut socket, &frame).await.is_err() {
                // Client went away; dropping the stream cancels the query.
                return;
            }
        }
        let _ = stream.finish().await;
    }

    info!("WebSocket connection closed");
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    socket.send(WsMessage::Text(json.into())).await
}

// ── Tool catalog ──────────────────────────────────────────────────────────

/// `GET /v1/tools` — List every registered tool with its schema.
async fn list_tools_handler(State(state): State<SharedApiState>) -> Json<ToolListResponse> {
    let tools: Vec<ToolDto> = state
        .tools
        .catalog()
        .into_iter()
        .map(|entry| ToolDto {
            name: entry.name,
            description: entry.description,
            parameters: entry.parameters,
        })
        .collect();

    Json(ToolListResponse {
        count: tools.len(),
        tools,
    })
}
