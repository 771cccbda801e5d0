//! Live display events.
//!
//! `ChatEvent`s are transient — they exist so front-ends can render a reply
//! as it streams. They are published per chat id on the [`ChatChannel`] and
//! never persisted; a client that subscribes late fetches the current
//! [`ChatState`] instead.
//!
//! [`ChatChannel`]: crate::channel::ChatChannel
//! [`ChatState`]: crate::message::ChatState

use serde::{Deserialize, Serialize};

use crate::message::Role;

/// Which field of the in-progress message a chunk belongs to.
///
/// Wire names match the streaming protocol consumed by front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventField {
    #[serde(rename = "content")]
    Content,
    #[serde(rename = "tool_call.id")]
    ToolCallId,
    #[serde(rename = "tool_call.name")]
    ToolCallName,
    #[serde(rename = "tool_call.arguments")]
    ToolCallArguments,
    /// Back-reference on a tool message to the call it answers.
    #[serde(rename = "tool_call_id")]
    ToolCallRef,
}

/// An event published on a chat's topic while a turn is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A new message box should be drawn.
    BeginMessage {
        id: String,
        role: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// An incremental fragment of the current message.
    AddChunk { field: EventField, chunk: String },

    /// The current message is complete.
    EndMessage,

    /// The chat's title was derived.
    UpdateTitle { title: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_message_serialization() {
        let event = ChatEvent::BeginMessage {
            id: "m1".into(),
            role: Role::Assistant,
            name: Some("Helper".into()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"begin_message""#));
        assert!(json.contains(r#""role":"assistant""#));
        assert!(json.contains(r#""name":"Helper""#));
    }

    #[test]
    fn add_chunk_uses_wire_field_names() {
        let event = ChatEvent::AddChunk {
            field: EventField::ToolCallArguments,
            chunk: "{\"a\"".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""field":"tool_call.arguments""#));

        let event = ChatEvent::AddChunk {
            field: EventField::ToolCallRef,
            chunk: "call_1".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""field":"tool_call_id""#));
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"add_chunk","field":"content","chunk":"hi"}"#;
        let event: ChatEvent = serde_json::from_str(json).unwrap();
        match event {
            ChatEvent::AddChunk { field, chunk } => {
                assert_eq!(field, EventField::Content);
                assert_eq!(chunk, "hi");
            }
            _ => panic!("Wrong variant"),
        }
    }
}
