//! `ironloop run`: one request through the loop against a transcript.

use std::path::PathBuf;
use std::sync::Arc;

use ironloop_config::RuntimeConfig;
use ironloop_core::event::EventBus;
use ironloop_runtime::AgentLoop;
use ironloop_tools::default_registry;
use serde_json::json;

use crate::replay::{ScriptedModelClient, Transcript};

pub async fn run(
    config_path: Option<PathBuf>,
    script: PathBuf,
    input: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = RuntimeConfig::load(config_path.as_deref())?;
    let transcript = Transcript::load(&script)?;

    let input = input
        .or(transcript.input)
        .ok_or("No input: pass --input or set \"input\" in the transcript")?;

    let event_bus = Arc::new(EventBus::default());
    let mut events = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::debug!(?event, "Domain event");
        }
    });

    let model = Arc::new(ScriptedModelClient::new(transcript.responses));
    let agent = AgentLoop::from_config(&config, model, Arc::new(default_registry()), event_bus);

    match agent.run(input).await {
        Ok(outcome) => {
            let report = json!({
                "answer": outcome.answer,
                "stop_reason": outcome.stop_reason,
                "usage": outcome.usage,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            let report = json!({
                "error": {
                    "kind": e.kind().as_str(),
                    "message": e.message(),
                    "details": e.details(),
                }
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Err(e.into())
        }
    }
}
