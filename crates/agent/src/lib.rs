//! Streaming agent loop and runners for Dendrite.
//!
//! The [`Agent`] is the reference [`Assistant`][dendrite_core::Assistant]:
//! it streams model completions, reassembles them into messages with
//! [`MessageBuilder`], executes tool calls through a toolkit, and announces
//! every fragment on the chat's channel as it arrives.

mod agent;
mod analysis;
mod builder;
mod runner;
mod title;

pub use agent::Agent;
pub use analysis::{TaskAnalysis, TaskAnalyzer, TaskStatus};
pub use builder::{Fragment, MessageBuilder};
pub use runner::Runner;
pub use title::update_title;

#[cfg(test)]
pub(crate) mod testing;
