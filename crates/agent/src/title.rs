//! Background title derivation.

use std::sync::Arc;

use dendrite_core::assistant::Assistant;
use dendrite_core::channel::ChatChannel;
use dendrite_core::chat::Chat;
use dendrite_core::error::{Error, Result};
use dendrite_core::event::ChatEvent;
use dendrite_core::message::{ChatState, Message};
use dendrite_core::provider::{Provider, ResponseFormat};
use dendrite_core::store::ChatStore;
use serde::Deserialize;
use tracing::debug;

use crate::agent::Agent;

#[derive(Debug, Deserialize)]
struct TitleResponse {
    title: String,
}

const TITLER_PROMPT: &str = "You title conversations. Given a chat transcript, produce a \
short descriptive title of at most six words. Use the language the user writes in.";

/// Derive and persist a title for a chat that does not have one yet.
///
/// Meant to run as a background task after the first turn: it loads the
/// chat, makes one structured model pass over a copy of the transcript,
/// saves the title, and publishes an update event. Chats that already have
/// a title are left alone.
pub async fn update_title(
    provider: Arc<dyn Provider>,
    model: &str,
    store: Arc<dyn ChatStore>,
    channel: &ChatChannel,
    chat_id: &str,
) -> Result<()> {
    let Some(mut state) = store.load(chat_id).await? else {
        return Err(Error::Store(dendrite_core::error::StoreError::NotFound(
            chat_id.to_string(),
        )));
    };
    if state.title.is_some() {
        return Ok(());
    }

    let titler = Agent::new(provider, "Titler", model, TITLER_PROMPT)
        .with_output_schema(ResponseFormat {
            name: "title_response".into(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {"title": {"type": "string"}},
                "required": ["title"],
                "additionalProperties": false,
            }),
        })
        .with_temperature(0.0);

    // Work on a throwaway copy so the titling exchange never lands in the
    // real transcript.
    let mut scratch = ChatState::new();
    scratch.messages = state.messages.clone();
    let mut chat = Chat::new(scratch);
    chat.push_message(Message::user("Title this conversation."))
        .await?;
    titler.run(&mut chat).await?;

    let value = chat
        .structured_output()
        .cloned()
        .ok_or_else(|| Error::MalformedOutput("Titler produced no output".into()))?;
    let response: TitleResponse = serde_json::from_value(value)
        .map_err(|e| Error::MalformedOutput(format!("Title did not match schema: {e}")))?;

    debug!(chat_id, title = %response.title, "Derived chat title");
    state.title = Some(response.title.clone());
    store.save(&state).await?;
    channel.publish(
        chat_id,
        ChatEvent::UpdateTitle {
            title: response.title,
        },
    );
    Ok(())
}
