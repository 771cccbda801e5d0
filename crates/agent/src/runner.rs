//! One-turn driver: user message in, new messages out.

use std::sync::Arc;

use dendrite_core::assistant::Assistant;
use dendrite_core::chat::Chat;
use dendrite_core::error::Result;
use dendrite_core::message::Message;

/// Owns a chat for the duration of a session and drives an assistant one
/// user turn at a time.
pub struct Runner {
    assistant: Arc<dyn Assistant>,
    chat: Chat,
}

impl Runner {
    pub fn new(assistant: Arc<dyn Assistant>, chat: Chat) -> Self {
        Self { assistant, chat }
    }

    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    pub fn chat_mut(&mut self) -> &mut Chat {
        &mut self.chat
    }

    /// Take one turn on the chat with a plain text user message.
    ///
    /// Returns every message the turn appended: the user message, the
    /// assistant reply, and any tool traffic in between.
    pub async fn run(&mut self, text: impl Into<String>) -> Result<Vec<Message>> {
        self.run_message(Message::user(text)).await
    }

    /// Take one turn with a pre-built message (delegation uses this to
    /// attribute the message to the calling assistant).
    pub async fn run_message(&mut self, message: Message) -> Result<Vec<Message>> {
        self.chat.take_new_messages();
        self.chat.announce_message(message).await?;
        self.assistant.run(&mut self.chat).await?;
        Ok(self.chat.take_new_messages())
    }

    /// Give the chat back when the session ends.
    pub fn into_chat(self) -> Chat {
        self.chat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::testing::{text_reply, MockProvider};
    use dendrite_core::message::{ChatState, Role};
    use dendrite_core::store::{ChatStore, MemoryChatStore};

    #[tokio::test]
    async fn run_returns_the_turns_messages() {
        let provider = Arc::new(MockProvider::new(vec![text_reply("Hello!")]));
        let agent = Arc::new(Agent::new(provider, "Helper", "mock-model", "Be helpful."));

        let mut runner = Runner::new(agent, Chat::new(ChatState::new()));
        let new = runner.run("Hi").await.unwrap();

        assert_eq!(new.len(), 2);
        assert_eq!(new[0].role, Role::User);
        assert_eq!(new[1].role, Role::Assistant);
        assert_eq!(new[1].content, "Hello!");
    }

    #[tokio::test]
    async fn consecutive_turns_share_history() {
        let provider = Arc::new(MockProvider::new(vec![
            text_reply("First reply"),
            text_reply("Second reply"),
        ]));
        let agent = Arc::new(Agent::new(
            provider.clone(),
            "Helper",
            "mock-model",
            "Be helpful.",
        ));

        let store = MemoryChatStore::shared();
        let chat = Chat::new(ChatState::with_assistant("c1", "Helper")).with_store(store.clone());
        let mut runner = Runner::new(agent, chat);

        let first = runner.run("one").await.unwrap();
        assert_eq!(first.len(), 2);
        let second = runner.run("two").await.unwrap();
        assert_eq!(second.len(), 2);

        // The second request's prompt includes the whole first turn.
        let requests = provider.requests.lock().unwrap();
        assert!(requests[1].messages.iter().any(|m| m.content == "First reply"));

        let persisted = store.load("c1").await.unwrap().unwrap();
        assert_eq!(persisted.messages.len(), 4);
    }
}
