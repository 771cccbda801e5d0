//! The streaming agent loop.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dendrite_core::assistant::Assistant;
use dendrite_core::chat::Chat;
use dendrite_core::error::{Error, Result};
use dendrite_core::event::ChatEvent;
use dendrite_core::message::{Message, Role};
use dendrite_core::provider::{
    CompletionRequest, FinishReason, PromptMessage, Provider, ResponseFormat, ToolSchema,
};
use dendrite_core::toolkit::{ToolContext, Toolkit};
use tracing::{debug, info, warn};

use crate::builder::MessageBuilder;

/// A model-backed assistant: prompt assembly, streamed reply reassembly,
/// and tool dispatch, looping until the model produces a final answer.
pub struct Agent {
    provider: Arc<dyn Provider>,

    /// Display name, attributed on every produced message
    name: String,

    /// Shown to peers that may delegate to this agent
    description: Option<String>,

    model: String,

    system_prompt: String,

    /// Few-shot examples injected as named system messages
    examples: Vec<(String, serde_json::Value)>,

    toolkit: Option<Arc<dyn Toolkit>>,

    /// When set, the final reply must parse against this schema
    output_schema: Option<ResponseFormat>,

    /// Maximum tool-dispatch rounds per run
    max_turns: u32,

    temperature: f32,

    max_tokens: Option<u32>,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        name: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            name: name.into(),
            description: None,
            model: model.into(),
            system_prompt: system_prompt.into(),
            examples: Vec::new(),
            toolkit: None,
            output_schema: None,
            max_turns: 10,
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_toolkit(mut self, toolkit: Arc<dyn Toolkit>) -> Self {
        self.toolkit = Some(toolkit);
        self
    }

    pub fn with_output_schema(mut self, schema: ResponseFormat) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_max_turns(mut self, max: u32) -> Self {
        self.max_turns = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Add a few-shot example: what a user might say and the exact value
    /// the agent should have answered with.
    pub fn with_example(mut self, user: impl Into<String>, reply: serde_json::Value) -> Self {
        self.examples.push((user.into(), reply));
        self
    }

    /// Assemble the prompt: dated system instructions, few-shot examples as
    /// named system messages, then the full chat history.
    fn build_prompt(&self, history: &[Message]) -> Vec<PromptMessage> {
        let today = Utc::now().format("%Y-%m-%d");
        let system = format!("{}\n\nToday is {today}.", self.system_prompt);

        let mut prompt = vec![PromptMessage::system(system, None)];

        for (user, reply) in &self.examples {
            prompt.push(PromptMessage::system(
                user.clone(),
                Some("example_user".into()),
            ));
            let reply_text = match reply {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            prompt.push(PromptMessage::system(
                reply_text,
                Some("example_assistant".into()),
            ));
        }

        prompt.extend(history.iter().map(PromptMessage::from));
        prompt
    }

    fn build_request(&self, chat: &Chat, tools: &[ToolSchema]) -> CompletionRequest {
        let mut request = CompletionRequest::new(&self.model, self.build_prompt(chat.messages()))
            .with_temperature(self.temperature)
            .with_tools(tools.to_vec());
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(format) = &self.output_schema {
            request = request.with_response_format(format.clone());
        }
        request
    }

    /// Stream one completion into the chat, reassembling deltas into a
    /// message while echoing each fragment as an add-chunk event.
    async fn stream_reply(&self, chat: &mut Chat, tools: &[ToolSchema]) -> Result<Message> {
        let request = self.build_request(chat, tools);
        let mut rx = self.provider.stream(request).await?;

        let mut builder = MessageBuilder::new().with_name(&self.name);
        chat.emit(ChatEvent::BeginMessage {
            id: builder.id().to_string(),
            role: Role::Assistant,
            name: Some(self.name.clone()),
        })?;

        let mut finish: Option<FinishReason> = None;
        while let Some(item) = rx.recv().await {
            let delta = item?;
            if let Some(reason) = &delta.finish {
                finish = Some(reason.clone());
            }
            for fragment in builder.apply(&delta)? {
                chat.emit(ChatEvent::AddChunk {
                    field: fragment.field,
                    chunk: fragment.chunk,
                })?;
            }
        }

        match finish {
            Some(FinishReason::Stop) | Some(FinishReason::ToolCalls) => {}
            Some(FinishReason::Other(reason)) => {
                return Err(Error::UnexpectedFinishReason(reason));
            }
            None => return Err(Error::StreamEnded),
        }

        chat.emit(ChatEvent::EndMessage)?;
        let message = builder.finalize();
        chat.push_message(message.clone()).await?;
        Ok(message)
    }

    /// Execute the reply's tool calls and append the results as announced
    /// tool messages.
    async fn dispatch_tools(&self, chat: &mut Chat, message: &Message) -> Result<()> {
        let Some(toolkit) = &self.toolkit else {
            return Err(Error::ProtocolViolation(
                "Model requested tool calls but no toolkit is attached".into(),
            ));
        };

        let ctx = ToolContext::new(&self.name, chat.delegation_depth());
        let results = toolkit.handle_tool_calls(&message.tool_calls, &ctx).await?;

        for result in results {
            let tool_name = message
                .tool_calls
                .iter()
                .find(|c| c.id == result.tool_call_id)
                .map(|c| c.name.clone())
                .unwrap_or_default();
            debug!(tool = %tool_name, "Tool call completed");
            // Tool results are attributed to the assistant that ran the tool.
            chat.announce_message(Message::tool_result(
                result.tool_call_id,
                self.name.clone(),
                result.content,
            ))
            .await?;
        }
        Ok(())
    }

    /// Parse the final reply against the declared output schema and stash
    /// the value on the chat.
    fn capture_structured_output(&self, chat: &mut Chat, message: &Message) -> Result<()> {
        if self.output_schema.is_none() {
            return Ok(());
        }
        let value: serde_json::Value = serde_json::from_str(&message.content)
            .map_err(|e| Error::MalformedOutput(format!("Reply is not valid JSON: {e}")))?;
        chat.set_structured_output(value);
        Ok(())
    }
}

#[async_trait]
impl Assistant for Agent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Take one full turn: stream replies and execute tool calls until the
    /// model stops, the turn budget runs out, or the client disconnects.
    async fn run(&self, chat: &mut Chat) -> Result<()> {
        info!(
            chat_id = %chat.id(),
            agent = %self.name,
            messages = chat.messages().len(),
            "Running agent turn"
        );

        let tools = match &self.toolkit {
            Some(toolkit) => toolkit.tools().await?,
            None => Vec::new(),
        };

        let mut dispatches = 0u32;
        loop {
            let message = self.stream_reply(chat, &tools).await?;

            if message.has_tool_calls() {
                dispatches += 1;
                if dispatches > self.max_turns {
                    warn!(chat_id = %chat.id(), limit = self.max_turns, "Turn budget exhausted");
                    return Err(Error::MaxTurnsExceeded {
                        limit: self.max_turns,
                    });
                }
                self.dispatch_tools(chat, &message).await?;
                continue;
            }

            self.capture_structured_output(chat, &message)?;
            return Ok(());
        }
    }
}
