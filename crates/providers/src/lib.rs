//! Model endpoint implementations for Dendrite.
//!
//! Everything here implements [`dendrite_core::Provider`]: turn a prepared
//! completion request into a raw delta stream. The single implementation,
//! [`OpenAiCompatProvider`], covers OpenAI, OpenRouter, Ollama, vLLM, and
//! any other endpoint speaking the `/v1/chat/completions` SSE protocol.

mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
