//! `provost serve` — Start the HTTP API server.

use provost_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Provost gateway");
    println!("  Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("  Model:     {}", config.model);
    println!("  Endpoints: /health, /v1/tools, /v1/query, /v1/query/stream, /v1/ws");

    provost_gateway::start(config).await?;

    Ok(())
}
