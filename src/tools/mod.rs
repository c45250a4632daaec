//! Tool abstractions and the dispatch boundary.

pub mod base_tool;
pub mod dispatcher;

pub use base_tool::{BaseTool, Tool, ToolArgs, ToolFn};
pub use dispatcher::ToolDispatcher;
