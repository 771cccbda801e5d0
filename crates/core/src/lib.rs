//! # Dendrite Core
//!
//! Domain types, traits, and error definitions for the Dendrite assistant
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod assistant;
pub mod channel;
pub mod chat;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod store;
pub mod toolkit;

// Re-export key types at crate root for ergonomics
pub use assistant::{Assistant, AssistantRegistry};
pub use channel::{ChatChannel, Subscription};
pub use chat::Chat;
pub use error::{Error, ProviderError, Result, StoreError, ToolkitError};
pub use event::{ChatEvent, EventField};
pub use message::{ChatState, Message, Role, ToolCall};
pub use chat::DEFAULT_DELEGATION_DEPTH;
pub use provider::{
    sanitize_name, CompletionDelta, CompletionRequest, FinishReason, PromptMessage, PromptRole,
    Provider, ResponseFormat, ToolCallDelta, ToolSchema,
};
pub use store::{ChatStore, FsChatStore, MemoryChatStore};
pub use toolkit::{ToolContext, ToolResult, Toolkit};
