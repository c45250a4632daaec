//! Tool dispatch: turning an action step into observation text.
//!
//! The dispatcher validates a tool call against the registered catalog and
//! executes it. It is infallible at the turn boundary: unknown tools and
//! tool failures come back as observation text the model can read and
//! correct itself from, never as errors escaping the turn. Exactly one
//! observation is produced per action.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use super::base_tool::BaseTool;
use crate::step::ToolCall;

/// Validates and executes tool calls against a registered catalog.
#[derive(Debug, Default)]
pub struct ToolDispatcher {
    catalog: HashMap<String, Arc<dyn BaseTool>>,
    /// Per-tool invocation counts across all turns.
    invocations: DashMap<String, u64>,
}

impl ToolDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher over the given tools.
    pub fn with_tools(tools: impl IntoIterator<Item = Arc<dyn BaseTool>>) -> Self {
        let mut dispatcher = Self::new();
        for tool in tools {
            dispatcher.register(tool);
        }
        dispatcher
    }

    /// Register a tool. Later registrations shadow earlier ones by name.
    pub fn register(&mut self, tool: Arc<dyn BaseTool>) {
        self.catalog.insert(tool.name().to_string(), tool);
    }

    /// Registered tool names, sorted for stable messages.
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.catalog.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a tool by name.
    ///
    /// Models confuse `.` and `-` connectors in tool names, so an exact
    /// lookup miss retries with the connectors normalized before giving up.
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn BaseTool>> {
        let name = name.trim();
        if let Some(tool) = self.catalog.get(name) {
            return Some(tool);
        }
        let normalized = name.replace('.', "-");
        self.catalog
            .iter()
            .find(|(registered, _)| registered.replace('.', "-") == normalized)
            .map(|(_, tool)| tool)
    }

    /// Execute a tool call and produce the paired observation text.
    pub async fn execute(&self, call: &ToolCall) -> String {
        let Some(tool) = self.resolve(&call.tool_call) else {
            log::warn!("unknown tool requested: '{}'", call.tool_call);
            return format!(
                "Tool '{}' does not exist. Available tools: {}.",
                call.tool_call,
                self.tool_names().join(", ")
            );
        };

        let name = tool.name().to_string();
        *self.invocations.entry(name.clone()).or_insert(0) += 1;

        let started_at = Instant::now();
        let result = tool.run(call.tool_args.clone()).await;
        log::debug!(
            "tool '{}' finished in {:?}",
            name,
            started_at.elapsed()
        );

        match result {
            Ok(text) => text,
            Err(e) => {
                log::warn!("tool '{}' failed: {e:#}", name);
                format!("Tool execution error: {e:#}")
            }
        }
    }

    /// How many times the named tool has been dispatched.
    pub fn invocation_count(&self, tool_name: &str) -> u64 {
        self.invocations
            .get(tool_name)
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// Total dispatches that reached a registered tool.
    pub fn total_invocations(&self) -> u64 {
        self.invocations.iter().map(|entry| *entry.value()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::base_tool::{Tool, ToolArgs};
    use serde_json::Value;

    fn dispatcher() -> ToolDispatcher {
        let exec: Arc<dyn BaseTool> = Arc::new(Tool::new(
            "cmd_tool-exec_cmd",
            "Run a shell command.",
            Arc::new(|args: ToolArgs| {
                let cmd = args
                    .get("cmd")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("missing 'cmd' argument"))?;
                Ok(format!("ran: {cmd}"))
            }),
        ));
        let broken: Arc<dyn BaseTool> = Arc::new(Tool::new(
            "broken_tool",
            "Always fails.",
            Arc::new(|_| anyhow::bail!("disk on fire")),
        ));
        ToolDispatcher::with_tools([exec, broken])
    }

    #[test]
    fn test_execute_known_tool() {
        let dispatcher = dispatcher();
        let call = ToolCall::new("cmd_tool-exec_cmd").with_arg("cmd", "echo ok");
        let observation = tokio_test::block_on(dispatcher.execute(&call));
        assert_eq!(observation, "ran: echo ok");
        assert_eq!(dispatcher.invocation_count("cmd_tool-exec_cmd"), 1);
    }

    #[test]
    fn test_unknown_tool_becomes_observation_text() {
        let dispatcher = dispatcher();
        let call = ToolCall::new("no_such_tool");
        let observation = tokio_test::block_on(dispatcher.execute(&call));
        assert!(observation.contains("'no_such_tool' does not exist"));
        assert!(observation.contains("cmd_tool-exec_cmd"));
        assert_eq!(dispatcher.total_invocations(), 0);
    }

    #[test]
    fn test_tool_failure_becomes_observation_text() {
        let dispatcher = dispatcher();
        let observation =
            tokio_test::block_on(dispatcher.execute(&ToolCall::new("broken_tool")));
        assert!(observation.contains("Tool execution error"));
        assert!(observation.contains("disk on fire"));
        // The failure still counts as a dispatch.
        assert_eq!(dispatcher.invocation_count("broken_tool"), 1);
    }

    #[test]
    fn test_connector_tolerant_lookup() {
        let dispatcher = dispatcher();
        let call = ToolCall::new("cmd_tool.exec_cmd").with_arg("cmd", "pwd");
        let observation = tokio_test::block_on(dispatcher.execute(&call));
        assert_eq!(observation, "ran: pwd");
        // The count is recorded under the registered name.
        assert_eq!(dispatcher.invocation_count("cmd_tool-exec_cmd"), 1);
    }
}
