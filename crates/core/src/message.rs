//! Message and chat-state domain types.
//!
//! These are the core value objects that flow through the entire system:
//! a user message enters a chat, the agent loop streams an assistant reply,
//! tool results are appended, and the whole history is persisted as
//! [`ChatState`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message in a conversation.
///
/// System instructions are not persisted — they are injected at the
/// provider-request seam (see [`crate::provider::PromptRole`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// Tool execution result
    Tool,
}

/// An invocation request emitted by the model.
///
/// `arguments` holds the raw serialized JSON object. It arrives
/// incrementally during streaming and is only guaranteed parseable once the
/// owning message has been finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within the owning message, assigned by the model endpoint
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON string
    pub arguments: String,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who produced this message
    pub role: Role,

    /// Display name of the producing assistant or caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The text content (empty string once finalized, never null)
    pub content: String,

    /// Tool calls requested by the assistant. Parallel tool calls are
    /// disabled at the request level, so this holds at most one entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// If this is a tool result, the `ToolCall.id` it answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            name: None,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a user message attributed to a named caller (used when one
    /// assistant delegates a task to another).
    pub fn user_named(name: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::user(content);
        msg.name = Some(name.into());
        msg
    }

    /// Create a new assistant message.
    pub fn assistant(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            name: Some(name.into()),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a tool result message answering the given tool call.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Tool,
            name: Some(name.into()),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            timestamp: Utc::now(),
        }
    }

    /// Whether this message requests any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The persisted state of one conversation: ordered message history plus
/// metadata. Append-only during a turn; the surrounding application may
/// delete messages or truncate for retry between turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatState {
    /// Unique chat ID
    pub id: String,

    /// Current default responder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant: Option<String>,

    /// Optional title, derived asynchronously after the first turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Ordered messages — the literal prompt history sent to the model
    #[serde(default)]
    pub messages: Vec<Message>,

    /// When this chat was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl ChatState {
    /// Create a new empty chat state.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            assistant: None,
            title: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new chat state with a known id and default assistant.
    pub fn with_assistant(id: impl Into<String>, assistant: impl Into<String>) -> Self {
        let mut state = Self::new();
        state.id = id.into();
        state.assistant = Some(assistant.into());
        state
    }

    /// Append a message to the history.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Delete a message by its ID. Returns true if a message was removed.
    pub fn remove_message(&mut self, message_id: &str) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != message_id);
        let removed = self.messages.len() != before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Truncate the history so the named message and everything after it is
    /// dropped. Used to retry from an assistant message. Returns the dropped
    /// message if found.
    pub fn truncate_before(&mut self, message_id: &str) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == message_id)?;
        let dropped = self.messages[index].clone();
        self.messages.truncate(index);
        self.updated_at = Utc::now();
        Some(dropped)
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}
