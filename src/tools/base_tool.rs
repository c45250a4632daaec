//! Tool catalog boundary.
//!
//! Tools are the only place external execution happens, and they are a
//! black box to the runtime: arbitrary latency, possible failure. The
//! contract is deliberately narrow: a tool takes a JSON argument map and
//! returns text, or fails with an opaque error that the dispatcher turns
//! into failure text for the model to read.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};

/// Argument map passed to a tool, as decoded from an `action` step.
pub type ToolArgs = Map<String, Value>;

/// Abstract interface every tool implements.
///
/// Implementations must be shareable across concurrent turns, so execution
/// takes `&self`; any internal state needs interior mutability.
#[async_trait]
pub trait BaseTool: Send + Sync + fmt::Debug {
    /// Unique tool name as the model addresses it.
    fn name(&self) -> &str;

    /// Description telling the model how/when/why to use the tool.
    fn description(&self) -> &str;

    /// Execute the tool with the given arguments.
    async fn run(&self, args: ToolArgs) -> anyhow::Result<String>;
}

/// Type alias for a boxed synchronous tool function.
pub type ToolFn = Arc<dyn Fn(ToolArgs) -> anyhow::Result<String> + Send + Sync>;

/// Concrete tool wrapping a callable function.
#[derive(Clone)]
pub struct Tool {
    tool_name: String,
    tool_description: String,
    func: ToolFn,
    usage_count: Arc<Mutex<u64>>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.tool_name)
            .field("description", &self.tool_description)
            .field("usage_count", &*self.usage_count.lock())
            .finish()
    }
}

impl Tool {
    /// Create a new tool wrapping the given function.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        func: ToolFn,
    ) -> Self {
        Self {
            tool_name: name.into(),
            tool_description: description.into(),
            func,
            usage_count: Arc::new(Mutex::new(0)),
        }
    }

    /// How many times this tool has been executed.
    pub fn usage_count(&self) -> u64 {
        *self.usage_count.lock()
    }
}

#[async_trait]
impl BaseTool for Tool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.tool_description
    }

    async fn run(&self, args: ToolArgs) -> anyhow::Result<String> {
        let result = (self.func)(args)?;
        *self.usage_count.lock() += 1;
        Ok(result)
    }
}
