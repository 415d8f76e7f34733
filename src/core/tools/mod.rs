//! Tool registry, dispatcher and the built-in tools.

mod base;
pub mod builtin;
mod dispatcher;
mod registry;

pub use base::{Tool, ToolError, ToolInvocation, ToolResult};
pub use builtin::{CHECK_PROGRESS_TOOL, builtin_registry};
pub use dispatcher::{ToolDispatcher, decode_arguments};
pub use registry::ToolRegistry;
