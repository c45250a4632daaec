//! Step data model for the reasoning loop.
//!
//! One member-turn is a sequence of steps: free-form thoughts, tool-calling
//! actions, observations synthesized from tool results, and a terminal final
//! answer. The transcript grammar is strict: a (possibly empty) run of
//! thoughts, then either an action (always followed by exactly one paired
//! observation) or a final answer. Two actions never occur back to back.

pub mod parser;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use parser::{parse_output, StepParseError};

/// A tool invocation requested inside an `action` step.
///
/// Wire shape: `{"tool_call": "<tool name>", "tool_args": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke; must be known to the dispatcher.
    pub tool_call: String,
    /// Arguments passed through to the tool.
    #[serde(default)]
    pub tool_args: Map<String, Value>,
}

impl ToolCall {
    /// Create a call with no arguments.
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_call: tool_name.into(),
            tool_args: Map::new(),
        }
    }

    /// Builder method to add an argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tool_args.insert(key.into(), value.into());
        self
    }
}

/// One step of a member-turn.
///
/// Serialized with a `step_name` tag so transcripts round-trip as flat
/// records, e.g. `{"step_name": "thought", "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step_name", rename_all = "snake_case")]
pub enum Step {
    /// Reasoning text; logged, never executed.
    Thought {
        text: String,
    },
    /// A request to invoke a tool.
    Action {
        #[serde(flatten)]
        call: ToolCall,
    },
    /// Tool result fed back into the loop. Synthesized by the dispatcher,
    /// never parsed from model output.
    Observation {
        text: String,
    },
    /// Terminal step carrying the member's answer.
    FinalAnswer {
        text: String,
    },
}

impl Step {
    /// Whether this step ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::FinalAnswer { .. })
    }

    /// The step tag as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Thought { .. } => "thought",
            Step::Action { .. } => "action",
            Step::Observation { .. } => "observation",
            Step::FinalAnswer { .. } => "final_answer",
        }
    }
}

/// Whether `transcript` matches the member-turn grammar:
/// `(Thought* Action Observation)* Thought* FinalAnswer?`.
///
/// In particular: every action is immediately followed by its paired
/// observation, observations never appear unpaired, and nothing follows a
/// final answer.
pub fn is_well_formed(transcript: &[Step]) -> bool {
    let mut steps = transcript.iter();
    while let Some(step) = steps.next() {
        match step {
            Step::Thought { .. } => {}
            Step::Action { .. } => {
                if !matches!(steps.next(), Some(Step::Observation { .. })) {
                    return false;
                }
            }
            Step::Observation { .. } => return false,
            Step::FinalAnswer { .. } => return steps.next().is_none(),
        }
    }
    true
}
