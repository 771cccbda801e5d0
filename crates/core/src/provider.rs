//! The model-provider seam.
//!
//! A [`Provider`] turns a prepared [`CompletionRequest`] into a stream of
//! [`CompletionDelta`]s. Deltas are deliberately raw — field fragments in
//! arrival order, no reassembly — so the agent loop owns the one place where
//! fragments become a [`Message`].
//!
//! [`Message`]: crate::message::Message

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::{Message, Role};

/// Role of a prompt message as sent to the model endpoint.
///
/// Unlike [`Role`], this includes `System`: system instructions exist only
/// at the request seam and are never part of persisted history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
    Tool,
}

impl From<Role> for PromptRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => PromptRole::User,
            Role::Assistant => PromptRole::Assistant,
            Role::Tool => PromptRole::Tool,
        }
    }
}

/// A single prompt entry in the exact shape the endpoint accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,

    pub content: String,

    /// Participant name. Endpoints restrict the alphabet, so names are
    /// sanitized before they reach the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<PromptToolCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl PromptMessage {
    /// A system-role prompt message, optionally attributed to a name.
    pub fn system(content: impl Into<String>, name: Option<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
            name: name.map(|n| sanitize_name(&n)),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

impl From<&Message> for PromptMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.into(),
            content: msg.content.clone(),
            name: msg.name.as_deref().map(sanitize_name),
            tool_calls: msg.tool_calls.iter().map(PromptToolCall::from).collect(),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

/// Tool call in wire shape: the function payload is nested and typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ToolCallKind,
    pub function: PromptFunctionCall,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallKind {
    Function,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptFunctionCall {
    pub name: String,
    pub arguments: String,
}

impl From<&crate::message::ToolCall> for PromptToolCall {
    fn from(call: &crate::message::ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: ToolCallKind::Function,
            function: PromptFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

/// Replace every character outside `[a-zA-Z0-9-]` with `_`.
///
/// Model endpoints reject names with spaces or punctuation; this keeps
/// display names like "Code Reviewer" usable on the wire.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Declarative description of one callable tool, advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,

    pub description: String,

    /// JSON Schema for the arguments object.
    pub parameters: Value,

    /// Ask the endpoint to constrain generation to the schema exactly.
    pub strict: bool,
}

/// A named JSON schema the final reply must conform to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    pub name: String,
    pub schema: Value,
}

/// Everything a provider needs to produce one streamed completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolSchema>,
    pub response_format: Option<ResponseFormat>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<PromptMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: None,
            tools: Vec::new(),
            response_format: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of the reply
    Stop,
    /// The model wants tools executed
    ToolCalls,
    /// Anything else (length, content filter, ...) — unsupported
    Other(String),
}

impl FinishReason {
    /// Map an endpoint's finish-reason string onto the supported set.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// One fragment of a tool call under construction. `index` identifies which
/// call within the message the fragment extends.
#[derive(Debug, Clone, Default)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// One raw streamed fragment of the completion.
///
/// Any subset of fields may be present; a delta carrying none is legal and
/// ignored downstream.
#[derive(Debug, Clone, Default)]
pub struct CompletionDelta {
    pub role: Option<Role>,
    pub content: Option<String>,
    pub tool_call: Option<ToolCallDelta>,
    pub finish: Option<FinishReason>,
}

/// Trait for streaming chat-completion backends.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Start a completion and return the delta stream.
    ///
    /// The receiver yields deltas in arrival order and closes when the
    /// stream ends. Mid-stream failures arrive as an `Err` item.
    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> Result<mpsc::Receiver<Result<CompletionDelta, ProviderError>>, ProviderError>;
}
