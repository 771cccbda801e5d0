//! The assistant seam and registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::chat::Chat;
use crate::error::{Error, Result};

/// Anything that can take a turn on a chat.
///
/// Implementations read the chat history, append their reply (and any tool
/// traffic) through the [`Chat`] handle, and return when the turn is done.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Display name, also used as the registry key (case-insensitive).
    fn name(&self) -> &str;

    /// One-line description shown to peers that may delegate to this
    /// assistant.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Produce a reply on the chat.
    async fn run(&self, chat: &mut Chat) -> Result<()>;
}

/// Name-keyed collection of assistants.
///
/// Keys are lowercased so lookups are forgiving about display-name casing.
#[derive(Default, Clone)]
pub struct AssistantRegistry {
    assistants: BTreeMap<String, Arc<dyn Assistant>>,
}

impl AssistantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an assistant. Registering a second assistant under the same
    /// name is a configuration error.
    pub fn register(&mut self, assistant: Arc<dyn Assistant>) -> Result<()> {
        let key = assistant.name().to_lowercase();
        if self.assistants.contains_key(&key) {
            return Err(Error::ProtocolViolation(format!(
                "Assistant already registered: {key}"
            )));
        }
        self.assistants.insert(key, assistant);
        Ok(())
    }

    /// Look up an assistant by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Assistant>> {
        self.assistants
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnknownAssistant(name.to_string()))
    }

    /// Registered display names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.assistants
            .values()
            .map(|a| a.name().to_string())
            .collect()
    }

    /// Name/description pairs for advertising delegation targets.
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.assistants
            .values()
            .map(|a| {
                (
                    a.name().to_string(),
                    a.description().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assistants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assistants.len()
    }
}

impl std::fmt::Debug for AssistantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Assistant for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn description(&self) -> Option<&str> {
            Some("Repeats the last message")
        }

        async fn run(&self, chat: &mut Chat) -> Result<()> {
            let last = chat
                .messages()
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            chat.announce_message(crate::message::Message::assistant("Echo", last))
                .await
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut registry = AssistantRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();

        assert!(registry.get("echo").is_ok());
        assert!(registry.get("ECHO").is_ok());
        assert!(matches!(
            registry.get("ghost"),
            Err(Error::UnknownAssistant(_))
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = AssistantRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();
        assert!(registry.register(Arc::new(Echo)).is_err());
    }

    #[tokio::test]
    async fn registered_assistant_runs() {
        let mut registry = AssistantRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();

        let mut chat = Chat::new(crate::message::ChatState::new());
        chat.push_message(crate::message::Message::user("ping"))
            .await
            .unwrap();

        registry.get("echo").unwrap().run(&mut chat).await.unwrap();
        assert_eq!(chat.messages().last().unwrap().content, "ping");
    }
}
