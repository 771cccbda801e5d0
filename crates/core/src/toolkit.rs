//! The toolkit seam.
//!
//! A [`Toolkit`] is the agent loop's only view of tools: advertise schemas,
//! execute calls. Dispatch is explicit — a toolkit knows its own names and
//! skips calls it does not recognize, which is what makes toolkits
//! composable.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::ToolCall;

/// Ambient call information passed to every tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Display name of the assistant making the call.
    pub caller: String,

    /// Remaining delegation budget. Each nested assistant run decrements
    /// this; at zero, delegation tools refuse to recurse.
    pub delegation_depth: u8,
}

impl ToolContext {
    pub fn new(caller: impl Into<String>, delegation_depth: u8) -> Self {
        Self {
            caller: caller.into(),
            delegation_depth,
        }
    }
}

/// The outcome of executing one tool call.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// The `ToolCall.id` this result answers.
    pub tool_call_id: String,

    /// Result payload as text, fed back to the model verbatim.
    pub content: String,
}

impl ToolResult {
    pub fn new(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}

/// A named collection of tools an assistant can call.
#[async_trait]
pub trait Toolkit: Send + Sync {
    /// The schemas to advertise to the model. Fetched once per run.
    async fn tools(&self) -> Result<Vec<crate::provider::ToolSchema>>;

    /// Execute the calls this toolkit recognizes, in order, and return one
    /// result per handled call. Unrecognized names are skipped, not errors.
    async fn handle_tool_calls(
        &self,
        calls: &[ToolCall],
        ctx: &ToolContext,
    ) -> Result<Vec<ToolResult>>;
}
