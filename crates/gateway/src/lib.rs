//! HTTP API gateway for Provost.
//!
//! Exposes the query loop over HTTP: a health probe, the tool catalog,
//! synchronous queries, NDJSON streaming, and a WebSocket for
//! bidirectional use.
//!
//! Built on Axum for async HTTP.

pub mod api_v1;

use std::sync::Arc;

use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use provost_agent::AgentLoop;
use provost_providers::OpenAiCompatGateway;
use provost_tools::CampusDirectory;

pub use api_v1::{ApiState, SharedApiState};

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS (any origin; the gateway binds to loopback by default)
/// - HTTP trace logging
pub fn build_router(state: SharedApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Builds the model gateway, campus directory, tool registry, and agent
/// loop ONCE and shares them via `Arc` across every request.
pub async fn start(config: provost_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    if !config.has_api_key() {
        warn!("no API key configured; model requests will fail unless the endpoint accepts anonymous access");
    }

    let model_gateway = OpenAiCompatGateway::new(
        "openai-compat",
        &config.base_url,
        config.api_key.clone().unwrap_or_default(),
        &config.model,
    )?
    .with_temperature(config.temperature);

    let directory = Arc::new(CampusDirectory::new());
    let tools = Arc::new(provost_tools::default_registry(directory)?);

    let mut agent = AgentLoop::new(Arc::new(model_gateway), tools.clone())
        .with_max_iterations(config.max_iterations);
    if let Some(persona) = &config.persona {
        agent = agent.with_persona(persona.clone());
    }

    let state = Arc::new(ApiState {
        agent: Arc::new(agent),
        tools,
    });

    let app = build_router(state);

    info!(addr = %addr, model = %config.model, "gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
