//! Scripted model client: replays recorded responses in order.

use std::collections::VecDeque;
use std::path::Path;

use ironloop_core::error::ModelError;
use ironloop_core::model::{ModelClient, ModelRequest, ModelResponse};
use serde::Deserialize;
use tokio::sync::Mutex;

/// A recorded conversation: the user input and the model's replies.
#[derive(Debug, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub input: Option<String>,

    pub responses: Vec<ModelResponse>,
}

impl Transcript {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read transcript {}: {e}", path.display()))?;
        let transcript = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse transcript {}: {e}", path.display()))?;
        Ok(transcript)
    }
}

/// Returns the transcript's responses one per call; running out is an
/// invalid-response error rather than a panic.
pub struct ScriptedModelClient {
    responses: Mutex<VecDeque<ModelResponse>>,
    total: usize,
}

impl ScriptedModelClient {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            total: responses.len(),
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedModelClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let (next, remaining) = {
            let mut queue = self.responses.lock().await;
            let next = queue.pop_front();
            (next, queue.len())
        };
        tracing::debug!(
            messages = request.messages.len(),
            remaining,
            "Replaying scripted response"
        );
        next.ok_or_else(|| {
            ModelError::InvalidResponse(format!("script exhausted after {} responses", self.total))
        })
    }
}
