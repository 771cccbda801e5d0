//! Reassembles streamed deltas into a complete message.

use dendrite_core::error::{Error, Result};
use dendrite_core::event::EventField;
use dendrite_core::message::{Message, Role, ToolCall};
use dendrite_core::provider::{CompletionDelta, ToolCallDelta};
use uuid::Uuid;

/// One displayable fragment produced while applying a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub field: EventField,
    pub chunk: String,
}

/// Incrementally builds one [`Message`] from raw completion deltas.
///
/// Fields fall into two classes. Fixed fields (`role`, `tool_call.id`) are
/// set once; a delta that rewrites one to a different value is a stream
/// contract violation. Streamable fields (`content`, `tool_call.name`,
/// `tool_call.arguments`) accumulate by appending, and every appended chunk
/// comes back as a [`Fragment`] so the caller can forward it to live
/// listeners.
///
/// Parallel tool calls are disabled at the request level, so a fragment for
/// any tool-call index other than 0 is also a contract violation.
#[derive(Debug)]
pub struct MessageBuilder {
    id: String,
    name: Option<String>,
    role: Option<Role>,
    content: String,
    tool_call_id: Option<String>,
    tool_call_name: String,
    tool_call_arguments: String,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: None,
            role: None,
            content: String::new(),
            tool_call_id: None,
            tool_call_name: String::new(),
            tool_call_arguments: String::new(),
        }
    }

    /// Attribute the finished message to a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Id the finished message will carry, available up front so a
    /// begin-message event can be emitted before any delta arrives.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fold one delta into the message under construction.
    ///
    /// Returns the fragments this delta contributed, in field order.
    pub fn apply(&mut self, delta: &CompletionDelta) -> Result<Vec<Fragment>> {
        if let Some(role) = delta.role {
            match self.role {
                None => self.role = Some(role),
                Some(existing) if existing == role => {}
                Some(existing) => {
                    return Err(Error::ProtocolViolation(format!(
                        "Role rewritten mid-message: {existing:?} -> {role:?}"
                    )));
                }
            }
        }

        let mut fragments = Vec::new();

        if let Some(content) = &delta.content {
            if !content.is_empty() {
                self.content.push_str(content);
                fragments.push(Fragment {
                    field: EventField::Content,
                    chunk: content.clone(),
                });
            }
        }

        if let Some(tool_call) = &delta.tool_call {
            self.apply_tool_call(tool_call, &mut fragments)?;
        }

        Ok(fragments)
    }

    fn apply_tool_call(
        &mut self,
        delta: &ToolCallDelta,
        fragments: &mut Vec<Fragment>,
    ) -> Result<()> {
        if delta.index != 0 {
            return Err(Error::ProtocolViolation(format!(
                "Parallel tool calls are disabled, got fragment for index {}",
                delta.index
            )));
        }

        if let Some(id) = &delta.id {
            match &self.tool_call_id {
                None => {
                    self.tool_call_id = Some(id.clone());
                    fragments.push(Fragment {
                        field: EventField::ToolCallId,
                        chunk: id.clone(),
                    });
                }
                // Some endpoints resend the full id on every fragment.
                Some(existing) if existing == id => {}
                Some(existing) => {
                    return Err(Error::ProtocolViolation(format!(
                        "Tool call id rewritten mid-message: {existing} -> {id}"
                    )));
                }
            }
        }

        if let Some(name) = &delta.name {
            if !name.is_empty() {
                self.tool_call_name.push_str(name);
                fragments.push(Fragment {
                    field: EventField::ToolCallName,
                    chunk: name.clone(),
                });
            }
        }

        if let Some(arguments) = &delta.arguments {
            if !arguments.is_empty() {
                self.tool_call_arguments.push_str(arguments);
                fragments.push(Fragment {
                    field: EventField::ToolCallArguments,
                    chunk: arguments.clone(),
                });
            }
        }

        Ok(())
    }

    /// Finish the message. The role defaults to assistant when the stream
    /// never declared one; a tool call exists iff its id was seen.
    pub fn finalize(self) -> Message {
        let tool_calls = match self.tool_call_id {
            Some(id) => vec![ToolCall {
                id,
                name: self.tool_call_name,
                arguments: self.tool_call_arguments,
            }],
            None => Vec::new(),
        };

        Message {
            id: self.id,
            role: self.role.unwrap_or(Role::Assistant),
            name: self.name,
            content: self.content,
            tool_calls,
            tool_call_id: None,
            timestamp: chrono::Utc::now(),
        }
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
