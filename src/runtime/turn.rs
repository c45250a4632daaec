//! One member's execution of the step loop.
//!
//! A turn is created when an utterance is dispatched to a member and lives
//! until a terminal outcome: completed, denied, errored, or cancelled. The
//! state machine is strict: `AwaitingStep` parses model output, `Acting`
//! runs exactly one tool call and commits its paired observation, `Done` is
//! terminal. Iteration is bounded so a model that never produces a final
//! answer cannot run a turn forever.

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::step::parser::FORMAT_REMINDER;
use crate::step::{is_well_formed, parse_output, Step};
use crate::team::{Denied, Member};
use crate::tools::ToolDispatcher;

use super::model::{ModelBackend, ModelRequest};

/// Default maximum number of thought/action steps per turn.
pub const DEFAULT_MAX_STEPS: u32 = 25;

/// Default number of consecutive unparseable outputs tolerated before the
/// turn is abandoned.
pub const DEFAULT_MAX_PARSE_FAILURES: u32 = 3;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Failures that end a turn. Contained: they never cross turn boundaries.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TurnError {
    /// The step budget ran out without a final answer.
    #[error("step budget of {budget} exceeded without a final answer")]
    StepBudgetExceeded { budget: u32 },

    /// The model kept producing output the step parser rejected.
    #[error("model output stayed malformed after retries: {reason}")]
    MalformedAction { reason: String },

    /// The model backend itself failed.
    #[error("model backend failure: {reason}")]
    ModelFailure { reason: String },
}

/// Terminal result of a turn.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The member produced a final answer.
    Completed { answer: String },
    /// The capability guard refused the invocation; no turn ran.
    Denied(Denied),
    /// The turn failed; the process and other turns continue.
    Errored(TurnError),
    /// The user ended the topic while the turn was in flight.
    Cancelled,
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnOutcome::Completed { answer } => write!(f, "{answer}"),
            TurnOutcome::Denied(denied) => write!(f, "{denied}"),
            TurnOutcome::Errored(error) => write!(f, "error: {error}"),
            TurnOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// Loop states of a running turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Waiting for the model's next step output.
    AwaitingStep,
    /// A tool call is executing.
    Acting,
    /// A terminal outcome has been reached.
    Done,
}

/// One member's execution of the step loop for one utterance.
#[derive(Debug)]
pub struct Turn {
    /// Unique id for log correlation.
    pub id: Uuid,
    /// The member running this turn.
    pub member: Member,
    /// The addressed task text the member was given.
    pub task: String,
    /// Committed steps, observations included.
    pub transcript: Vec<Step>,
    /// When the turn was created.
    pub started_at: DateTime<Utc>,
    state: TurnState,
    max_steps: u32,
    max_parse_failures: u32,
    steps_taken: u32,
}

impl Turn {
    /// Create a turn for `member` working on `task`.
    pub fn new(member: Member, task: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            member,
            task: task.into(),
            transcript: Vec::new(),
            started_at: Utc::now(),
            state: TurnState::AwaitingStep,
            max_steps: DEFAULT_MAX_STEPS,
            max_parse_failures: DEFAULT_MAX_PARSE_FAILURES,
            steps_taken: 0,
        }
    }

    /// Builder method to override the step budget.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Builder method to override the parse-failure tolerance.
    pub fn with_max_parse_failures(mut self, max_parse_failures: u32) -> Self {
        self.max_parse_failures = max_parse_failures;
        self
    }

    /// Current loop state.
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Thought/action steps consumed so far.
    pub fn steps_taken(&self) -> u32 {
        self.steps_taken
    }

    fn finish(&mut self, outcome: TurnOutcome) -> TurnOutcome {
        self.state = TurnState::Done;
        log::info!("turn {} [{}] finished: {outcome:?}", self.id, self.member.name);
        outcome
    }

    /// Drive the full step loop in agent mode until a terminal outcome.
    ///
    /// The capability check has already happened; a denied member never
    /// reaches this point.
    pub async fn drive(
        &mut self,
        model: &dyn ModelBackend,
        dispatcher: &ToolDispatcher,
        cancel: &mut watch::Receiver<bool>,
    ) -> TurnOutcome {
        let mut correction: Option<String> = None;
        let mut parse_failures: u32 = 0;

        loop {
            if *cancel.borrow() {
                return self.finish(TurnOutcome::Cancelled);
            }
            if self.steps_taken >= self.max_steps {
                return self.finish(TurnOutcome::Errored(TurnError::StepBudgetExceeded {
                    budget: self.max_steps,
                }));
            }

            let request = ModelRequest {
                member: &self.member,
                task: &self.task,
                transcript: &self.transcript,
                correction: correction.as_deref(),
            };
            let awaited = await_cancellable(model.next_output(request), cancel).await;
            let raw = match awaited {
                None => return self.finish(TurnOutcome::Cancelled),
                Some(Err(e)) => {
                    return self.finish(TurnOutcome::Errored(TurnError::ModelFailure {
                        reason: format!("{e:#}"),
                    }))
                }
                Some(Ok(raw)) => raw,
            };
            correction = None;

            let steps = match parse_output(&raw) {
                Ok(steps) => {
                    parse_failures = 0;
                    steps
                }
                Err(e) => {
                    parse_failures += 1;
                    self.steps_taken += 1;
                    log::warn!(
                        "turn {} [{}] rejected model output: {e}",
                        self.id,
                        self.member.name
                    );
                    if parse_failures >= self.max_parse_failures {
                        return self.finish(TurnOutcome::Errored(TurnError::MalformedAction {
                            reason: e.to_string(),
                        }));
                    }
                    correction = Some(format!("{e}. {FORMAT_REMINDER}"));
                    continue;
                }
            };

            for step in steps {
                match step {
                    Step::Thought { text } => {
                        log::debug!("turn {} [{}] thought: {text}", self.id, self.member.name);
                        self.transcript.push(Step::Thought { text });
                        self.steps_taken += 1;
                    }
                    Step::Action { call } => {
                        log::debug!(
                            "turn {} [{}] action: {}",
                            self.id,
                            self.member.name,
                            call.tool_call
                        );
                        self.steps_taken += 1;
                        self.state = TurnState::Acting;

                        // A dispatched tool call always runs to completion;
                        // cancellation is honored at the boundary after it.
                        let observation = dispatcher.execute(&call).await;
                        if *cancel.borrow() {
                            return self.finish(TurnOutcome::Cancelled);
                        }

                        self.transcript.push(Step::Action { call });
                        self.transcript.push(Step::Observation { text: observation });
                        self.state = TurnState::AwaitingStep;
                    }
                    Step::FinalAnswer { text } => {
                        self.transcript.push(Step::FinalAnswer { text: text.clone() });
                        debug_assert!(is_well_formed(&self.transcript));
                        return self.finish(TurnOutcome::Completed { answer: text });
                    }
                    Step::Observation { .. } => {
                        // The parser rejects observation tags, so this arm is
                        // unreachable from model output.
                        return self.finish(TurnOutcome::Errored(TurnError::MalformedAction {
                            reason: "model emitted an observation".to_string(),
                        }));
                    }
                }
            }
            debug_assert!(is_well_formed(&self.transcript));
        }
    }

    /// Drive a single-reply chat turn: one model output, taken verbatim as
    /// the final answer. No steps are parsed and no tools run.
    pub async fn drive_chat(
        &mut self,
        model: &dyn ModelBackend,
        cancel: &mut watch::Receiver<bool>,
    ) -> TurnOutcome {
        if *cancel.borrow() {
            return self.finish(TurnOutcome::Cancelled);
        }

        let request = ModelRequest {
            member: &self.member,
            task: &self.task,
            transcript: &self.transcript,
            correction: None,
        };
        let awaited = await_cancellable(model.next_output(request), cancel).await;
        match awaited {
            None => self.finish(TurnOutcome::Cancelled),
            Some(Err(e)) => self.finish(TurnOutcome::Errored(TurnError::ModelFailure {
                reason: format!("{e:#}"),
            })),
            Some(Ok(raw)) => {
                let answer = raw.trim().to_string();
                self.transcript.push(Step::FinalAnswer {
                    text: answer.clone(),
                });
                self.steps_taken += 1;
                self.finish(TurnOutcome::Completed { answer })
            }
        }
    }
}

/// Await `fut`, abandoning it if the cancel flag flips to `true` first.
///
/// Returns `None` on cancellation. If the sender side is gone, cancellation
/// can no longer happen and the future is simply awaited.
async fn await_cancellable<F>(fut: F, cancel: &mut watch::Receiver<bool>) -> Option<F::Output>
where
    F: Future,
{
    tokio::pin!(fut);
    loop {
        if *cancel.borrow() {
            return None;
        }
        tokio::select! {
            out = fut.as_mut() => return Some(out),
            changed = cancel.changed() => match changed {
                Ok(()) => continue,
                Err(_) => return Some(fut.await),
            },
        }
    }
}
