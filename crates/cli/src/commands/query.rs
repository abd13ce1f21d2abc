//! `provost query` — Run one query and stream its progress.

use std::sync::Arc;

use provost_agent::{AgentLoop, Frame, QueryEvent, encode_line};
use provost_config::AppConfig;
use provost_core::ToolOutcome;
use provost_providers::OpenAiCompatGateway;
use provost_tools::CampusDirectory;

pub async fn run(prompt: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for an API key early and give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PROVOST_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY  = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let agent = build_agent(&config)?;
    let mut stream = agent.stream_query(prompt);

    while let Some(event) = stream.next_event().await {
        if json {
            print!("{}", encode_line(&Frame::from(event)));
        } else {
            print_progress(&event);
        }
    }

    match stream.finish().await {
        Ok(_) => Ok(()),
        Err(e) => Err(format!("query aborted ({}): {e}", e.reason()).into()),
    }
}

fn build_agent(config: &AppConfig) -> Result<AgentLoop, Box<dyn std::error::Error>> {
    let gateway = OpenAiCompatGateway::new(
        "openai-compat",
        &config.base_url,
        config.api_key.clone().unwrap_or_default(),
        &config.model,
    )?
    .with_temperature(config.temperature);

    let directory = Arc::new(CampusDirectory::new());
    let tools = Arc::new(provost_tools::default_registry(directory)?);

    let mut agent =
        AgentLoop::new(Arc::new(gateway), tools).with_max_iterations(config.max_iterations);
    if let Some(persona) = &config.persona {
        agent = agent.with_persona(persona.clone());
    }

    Ok(agent)
}

/// Render one event as a readable progress line.
///
/// Progress goes to stderr; only the final answer lands on stdout. A
/// terminal `Error` event is not printed here, the caller reports it once
/// through the returned error.
fn print_progress(event: &QueryEvent) {
    match event {
        QueryEvent::Status { message } => eprintln!("  · {message}"),
        QueryEvent::ToolInvoked {
            tool_name,
            arguments,
            ..
        } => eprintln!("  → {tool_name} {arguments}"),
        QueryEvent::ToolSettled {
            tool_name, outcome, ..
        } => match outcome {
            ToolOutcome::Ok { value } => eprintln!("  ← {tool_name} ok: {value}"),
            ToolOutcome::Err { reason } => eprintln!("  ← {tool_name} err: {reason}"),
        },
        QueryEvent::FinalAnswer { text } => {
            println!();
            println!("{text}");
        }
        QueryEvent::Error { .. } => {}
    }
}
