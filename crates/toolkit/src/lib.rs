//! Toolkit implementations for Dendrite.
//!
//! Four flavors of [`Toolkit`][dendrite_core::Toolkit]:
//! - [`FunctionToolkit`] — native Rust functions with declared parameters
//! - [`ExternalToolkit`] — tools hosted by an out-of-process server
//! - [`DelegationToolkit`] — hand a task to a peer assistant
//! - [`CompositeToolkit`] — several toolkits presented as one

mod composite;
mod delegate;
mod external;
mod function;

pub use composite::CompositeToolkit;
pub use delegate::{DelegationToolkit, TaskResponse, DELEGATE_TOOL_NAME};
pub use external::{ContentBlock, ExternalToolkit, ServerTool, StdioToolServer, ToolServer};
pub use function::{FnTool, FunctionToolkit, NativeFunction, ParamSpec};
