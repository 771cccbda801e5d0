//! Structured transcript analysis.
//!
//! After a delegated task runs, the caller needs a machine-readable verdict
//! rather than a raw transcript. [`TaskAnalyzer`] makes one extra model pass
//! over the transcript with a strict output schema and returns the parsed
//! [`TaskAnalysis`].

use std::sync::Arc;

use dendrite_core::chat::Chat;
use dendrite_core::error::{Error, Result};
use dendrite_core::message::{ChatState, Message};
use dendrite_core::provider::{Provider, ResponseFormat};
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use dendrite_core::assistant::Assistant;

/// Where a delegated task stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Still in progress
    Working,
    /// Blocked on information only the caller can provide
    InputRequired,
    /// Done
    Completed,
    /// Gave up
    Failed,
}

/// The analyzer's verdict on a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub status: TaskStatus,

    /// The extracted answer, when there is one
    #[serde(default)]
    pub result: Option<String>,
}

const ANALYZER_PROMPT: &str = "You review the transcript of an assistant working on a \
delegated task. Decide whether the task is completed, failed, still in progress, or \
blocked on input from the caller. When an answer exists, extract it verbatim into the \
result field. Judge only from the transcript.";

/// Runs the structured analysis pass.
pub struct TaskAnalyzer {
    agent: Agent,
}

impl TaskAnalyzer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let agent = Agent::new(provider, "TaskAnalyzer", model, ANALYZER_PROMPT)
            .with_output_schema(ResponseFormat {
                name: "task_analysis".into(),
                schema: analysis_schema(),
            })
            .with_temperature(0.0);
        Self { agent }
    }

    /// Analyze a transcript. Runs on a throwaway chat so the analysis never
    /// touches the transcript's own history.
    pub async fn analyze(&self, transcript: &[Message]) -> Result<TaskAnalysis> {
        let mut state = ChatState::new();
        for message in transcript {
            state.messages.push(message.clone());
        }

        let mut chat = Chat::new(state);
        chat.push_message(Message::user(
            "Analyze the task transcript above and report its status.",
        ))
        .await?;

        self.agent.run(&mut chat).await?;

        let value = chat
            .structured_output()
            .cloned()
            .ok_or_else(|| Error::MalformedOutput("Analyzer produced no output".into()))?;
        serde_json::from_value(value)
            .map_err(|e| Error::MalformedOutput(format!("Analysis did not match schema: {e}")))
    }
}

fn analysis_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "status": {
                "type": "string",
                "enum": ["working", "input_required", "completed", "failed"],
            },
            "result": {"type": ["string", "null"]},
        },
        "required": ["status", "result"],
        "additionalProperties": false,
    })
}
