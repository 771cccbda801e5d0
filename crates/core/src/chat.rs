//! The live conversation handle.
//!
//! A [`Chat`] wraps one [`ChatState`] for the duration of a run and carries
//! the ambient wiring an assistant needs while producing a reply: the event
//! channel, the persistence store, the client-disconnect flag, and the
//! remaining delegation budget. Assistants mutate the conversation only
//! through this handle, so every appended message is persisted and announced
//! consistently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::channel::ChatChannel;
use crate::error::{Error, Result};
use crate::event::{ChatEvent, EventField};
use crate::message::{ChatState, Message};
use crate::store::ChatStore;

/// Default number of nested delegation hops allowed per run.
pub const DEFAULT_DELEGATION_DEPTH: u8 = 4;

/// One conversation plus its runtime wiring.
pub struct Chat {
    state: ChatState,
    new_messages: Vec<Message>,
    structured_output: Option<Value>,
    channel: Option<ChatChannel>,
    store: Option<Arc<dyn ChatStore>>,
    disconnected: Option<Arc<AtomicBool>>,
    delegation_depth: u8,
}

impl Chat {
    pub fn new(state: ChatState) -> Self {
        Self {
            state,
            new_messages: Vec::new(),
            structured_output: None,
            channel: None,
            store: None,
            disconnected: None,
            delegation_depth: DEFAULT_DELEGATION_DEPTH,
        }
    }

    /// Publish events on this channel under the chat's id.
    pub fn with_channel(mut self, channel: ChatChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Persist state after every appended message.
    pub fn with_store(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Abort the run cleanly when this flag flips to true.
    pub fn with_disconnect_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.disconnected = Some(flag);
        self
    }

    pub fn with_delegation_depth(mut self, depth: u8) -> Self {
        self.delegation_depth = depth;
        self
    }

    pub fn id(&self) -> &str {
        &self.state.id
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ChatState {
        &mut self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    pub fn delegation_depth(&self) -> u8 {
        self.delegation_depth
    }

    pub fn channel(&self) -> Option<&ChatChannel> {
        self.channel.as_ref()
    }

    pub fn store(&self) -> Option<&Arc<dyn ChatStore>> {
        self.store.as_ref()
    }

    /// Parsed structured output from the most recent run, when the
    /// assistant declared an output schema.
    pub fn structured_output(&self) -> Option<&Value> {
        self.structured_output.as_ref()
    }

    pub fn set_structured_output(&mut self, value: Value) {
        self.structured_output = Some(value);
    }

    /// Messages appended since the handle was created (or last taken).
    pub fn take_new_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.new_messages)
    }

    /// Publish an event on the chat's topic.
    ///
    /// Returns [`Error::Disconnected`] once the client has gone away, which
    /// unwinds the run before the next model request or tool execution.
    /// Having no subscribers is not an error.
    pub fn emit(&self, event: ChatEvent) -> Result<()> {
        if let Some(flag) = &self.disconnected {
            if flag.load(Ordering::Relaxed) {
                return Err(Error::Disconnected);
            }
        }
        if let Some(channel) = &self.channel {
            channel.publish(&self.state.id, event);
        }
        Ok(())
    }

    /// Append a message: record it in the history, track it as new, and
    /// persist the updated state if a store is attached.
    pub async fn push_message(&mut self, message: Message) -> Result<()> {
        debug!(chat_id = %self.state.id, role = ?message.role, "Appending message");
        self.state.push(message.clone());
        self.new_messages.push(message);
        if let Some(store) = &self.store {
            store.save(&self.state).await?;
        }
        Ok(())
    }

    /// Append a message that was produced whole (tool results, injected
    /// replies), announcing it as a begin/chunks/end triplet so live
    /// listeners render it exactly like a streamed one.
    pub async fn announce_message(&mut self, message: Message) -> Result<()> {
        self.emit(ChatEvent::BeginMessage {
            id: message.id.clone(),
            role: message.role,
            name: message.name.clone(),
        })?;
        if !message.content.is_empty() {
            self.emit(ChatEvent::AddChunk {
                field: EventField::Content,
                chunk: message.content.clone(),
            })?;
        }
        if let Some(call_id) = &message.tool_call_id {
            self.emit(ChatEvent::AddChunk {
                field: EventField::ToolCallRef,
                chunk: call_id.clone(),
            })?;
        }
        self.emit(ChatEvent::EndMessage)?;
        self.push_message(message).await
    }
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("id", &self.state.id)
            .field("messages", &self.state.messages.len())
            .field("delegation_depth", &self.delegation_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryChatStore;

    #[tokio::test]
    async fn push_persists_and_tracks_new_messages() {
        let store = MemoryChatStore::shared();
        let mut chat = Chat::new(ChatState::with_assistant("c1", "Helper"))
            .with_store(store.clone());

        chat.push_message(Message::user("hi")).await.unwrap();
        assert_eq!(chat.messages().len(), 1);

        let saved = store.load("c1").await.unwrap().unwrap();
        assert_eq!(saved.messages.len(), 1);

        let new = chat.take_new_messages();
        assert_eq!(new.len(), 1);
        assert!(chat.take_new_messages().is_empty());
    }

    #[tokio::test]
    async fn announce_emits_full_triplet() {
        let channel = ChatChannel::new();
        let mut sub = channel.subscribe("c1");
        let mut chat = Chat::new(ChatState::with_assistant("c1", "Helper"))
            .with_channel(channel);

        let msg = Message::tool_result("call_9", "Calculator", "7");
        chat.announce_message(msg).await.unwrap();

        assert!(matches!(
            sub.recv().await.unwrap(),
            ChatEvent::BeginMessage { .. }
        ));
        // Content first, then the tool-call back-reference.
        match sub.recv().await.unwrap() {
            ChatEvent::AddChunk { field, chunk } => {
                assert_eq!(field, EventField::Content);
                assert_eq!(chunk, "7");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match sub.recv().await.unwrap() {
            ChatEvent::AddChunk { field, chunk } => {
                assert_eq!(field, EventField::ToolCallRef);
                assert_eq!(chunk, "call_9");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(sub.recv().await.unwrap(), ChatEvent::EndMessage));
    }

    #[tokio::test]
    async fn emit_without_channel_is_fine() {
        let chat = Chat::new(ChatState::new());
        chat.emit(ChatEvent::EndMessage).unwrap();
    }

    #[tokio::test]
    async fn emit_after_disconnect_fails_cleanly() {
        let flag = Arc::new(AtomicBool::new(false));
        let chat = Chat::new(ChatState::new()).with_disconnect_flag(flag.clone());

        chat.emit(ChatEvent::EndMessage).unwrap();
        flag.store(true, Ordering::Relaxed);

        let err = chat.emit(ChatEvent::EndMessage).unwrap_err();
        assert!(err.is_disconnect());
    }
}
