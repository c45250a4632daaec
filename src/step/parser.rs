//! Parsing of raw model output into typed steps.
//!
//! The model speaks in tagged blocks:
//!
//! ```text
//! <thought>
//! The file may be large, check its size first.
//! </thought>
//!
//! <action>
//! {"tool_call": "cmd_tool-exec_cmd", "tool_args": {"cmd": "du -h /tmp/123"}}
//! </action>
//! ```
//!
//! Parsing is total and side-effect-free: it never executes a tool and
//! never panics on hostile input. Observations are synthesized by the
//! dispatcher, so a literal `observation` tag in model output is an error.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::{Step, ToolCall};

/// Matches one tagged step block. The `observation` alternative exists only
/// so the parser can reject it explicitly instead of ignoring it.
static STEP_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<thought>\s*(?P<thought>.*?)\s*</thought>|<action>\s*(?P<action>.*?)\s*</action>|<final_answer>\s*(?P<final>.*?)\s*</final_answer>|<observation>\s*(?P<observation>.*?)\s*</observation>",
    )
    .expect("invalid step block regex")
});

/// Format reminder sent back to the model after a parse failure.
pub const FORMAT_REMINDER: &str = "You MUST reply using tagged step blocks:\n\
    <thought>your reasoning</thought>\n\
    <action>{\"tool_call\": \"<tool name>\", \"tool_args\": {...}}</action>\n\
    or\n\
    <final_answer>your answer</final_answer>\n\
    At most one action or final_answer per reply, as the last block.";

/// Ways a raw model turn can fail to parse.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StepParseError {
    /// No recognized step block in the output.
    #[error("no step block found in model output")]
    NoSteps,

    /// The model emitted a tag it is not allowed to produce.
    #[error("unexpected '{tag}' block in model output")]
    UnexpectedTag { tag: String },

    /// An `action` body did not decode as a tool call.
    #[error("malformed action payload: {reason}")]
    MalformedAction { reason: String },

    /// Blocks were present but violate the step grammar.
    #[error("malformed step sequence: {reason}")]
    MalformedSequence { reason: String },
}

/// Parse one raw model-turn output into steps.
///
/// Accepts zero or more `thought` blocks optionally followed by exactly one
/// `action` or `final_answer` block. Text outside recognized blocks is
/// ignored. Returns at least one step on success.
pub fn parse_output(raw: &str) -> Result<Vec<Step>, StepParseError> {
    let mut steps = Vec::new();

    for captures in STEP_BLOCK.captures_iter(raw) {
        if let Some(previous) = steps.last() {
            if !matches!(previous, Step::Thought { .. }) {
                return Err(StepParseError::MalformedSequence {
                    reason: format!("'{}' must be the last block in the reply", previous.name()),
                });
            }
        }

        if let Some(text) = captures.name("thought") {
            steps.push(Step::Thought {
                text: text.as_str().to_string(),
            });
        } else if let Some(body) = captures.name("action") {
            steps.push(Step::Action {
                call: parse_action_body(body.as_str())?,
            });
        } else if let Some(text) = captures.name("final") {
            steps.push(Step::FinalAnswer {
                text: text.as_str().to_string(),
            });
        } else {
            return Err(StepParseError::UnexpectedTag {
                tag: "observation".to_string(),
            });
        }
    }

    if steps.is_empty() {
        return Err(StepParseError::NoSteps);
    }
    Ok(steps)
}

/// Decode an `action` block body as a [`ToolCall`].
fn parse_action_body(body: &str) -> Result<ToolCall, StepParseError> {
    let call: ToolCall =
        serde_json::from_str(body).map_err(|e| StepParseError::MalformedAction {
            reason: e.to_string(),
        })?;
    if call.tool_call.trim().is_empty() {
        return Err(StepParseError::MalformedAction {
            reason: "empty tool name".to_string(),
        });
    }
    Ok(call)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_thought_then_action() {
        let raw = "<thought>\ncheck the file\n</thought>\n\n<action>\n{\"tool_call\": \"cmd_tool-exec_cmd\", \"tool_args\": {\"cmd\": \"ls /tmp/123\"}}\n</action>";
        let steps = parse_output(raw).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(
            steps[0],
            Step::Thought {
                text: "check the file".into()
            }
        );
        match &steps[1] {
            Step::Action { call } => {
                assert_eq!(call.tool_call, "cmd_tool-exec_cmd");
                assert_eq!(call.tool_args["cmd"], "ls /tmp/123");
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_final_answer() {
        let steps = parse_output("<final_answer>All clear.</final_answer>").unwrap();
        assert_eq!(
            steps,
            vec![Step::FinalAnswer {
                text: "All clear.".into()
            }]
        );
    }

    #[test]
    fn test_parse_thoughts_only_is_valid() {
        let steps = parse_output("<thought>a</thought><thought>b</thought>").unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| matches!(s, Step::Thought { .. })));
    }

    #[test]
    fn test_action_with_missing_args_defaults_empty() {
        let steps =
            parse_output("<action>{\"tool_call\": \"search_tool\"}</action>").unwrap();
        match &steps[0] {
            Step::Action { call } => assert!(call.tool_args.is_empty()),
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_action_body() {
        let err = parse_output("<action>not json</action>").unwrap_err();
        assert!(matches!(err, StepParseError::MalformedAction { .. }));

        let err = parse_output("<action>{\"tool_call\": \"\"}</action>").unwrap_err();
        assert!(matches!(err, StepParseError::MalformedAction { .. }));
    }

    #[test]
    fn test_model_may_not_emit_observations() {
        let err = parse_output("<observation>fake result</observation>").unwrap_err();
        assert_eq!(
            err,
            StepParseError::UnexpectedTag {
                tag: "observation".into()
            }
        );
    }

    #[test]
    fn test_terminal_block_must_be_last() {
        let raw = "<action>{\"tool_call\": \"a\"}</action><action>{\"tool_call\": \"b\"}</action>";
        let err = parse_output(raw).unwrap_err();
        assert!(matches!(err, StepParseError::MalformedSequence { .. }));

        let raw = "<final_answer>done</final_answer><thought>late</thought>";
        assert!(matches!(
            parse_output(raw),
            Err(StepParseError::MalformedSequence { .. })
        ));
    }

    #[test]
    fn test_untagged_output_is_no_steps() {
        assert_eq!(parse_output("plain prose answer"), Err(StepParseError::NoSteps));
    }

    #[test]
    fn test_surrounding_prose_is_ignored() {
        let raw = "Sure, here is my plan:\n<thought>scan first</thought>\ntrailing chatter\n<final_answer>ok</final_answer>";
        let steps = parse_output(raw).unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps[1].is_terminal());
    }
}
