//! The conversation loop: one utterance in, one ordered team report out.
//!
//! Dispatch resolves mentions to a member set, capability-checks each member
//! once, then runs one turn per cleared member. Turns for distinct members
//! run concurrently; turns for the same member serialize behind a per-member
//! lock because a member's conversational state is not reentrant. Whatever
//! order turns finish in, the report presents results in resolution order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::team::{mention, Capability, CapabilityGuard, Member, TeamRegistry};
use crate::tools::ToolDispatcher;

use super::model::ModelBackend;
use super::turn::{Turn, TurnError, TurnOutcome, DEFAULT_MAX_STEPS};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// One member's contribution to a team report.
#[derive(Debug, Clone)]
pub struct MemberResult {
    /// The member's name.
    pub member: String,
    /// How the member's turn ended.
    pub outcome: TurnOutcome,
}

/// Aggregated response to one utterance, in member-resolution order.
#[derive(Debug, Clone, Default)]
pub struct TeamReport {
    /// Per-member results, ordered by mention resolution.
    pub results: Vec<MemberResult>,
    /// Non-fatal routing warnings, e.g. unknown mentions.
    pub warnings: Vec<String>,
}

impl TeamReport {
    /// Completed answers in resolution order, paired with member names.
    pub fn answers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            TurnOutcome::Completed { answer } => Some((r.member.as_str(), answer.as_str())),
            _ => None,
        })
    }
}

impl fmt::Display for TeamReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        for result in &self.results {
            writeln!(f, "[{}] {}", result.member, result.outcome)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConversationLoop
// ---------------------------------------------------------------------------

/// Drives member turns for user utterances against a fixed roster.
pub struct ConversationLoop {
    registry: Arc<TeamRegistry>,
    guard: CapabilityGuard,
    dispatcher: Arc<ToolDispatcher>,
    model: Arc<dyn ModelBackend>,
    max_steps: u32,
    /// One lock per member: at most one active turn per member at a time.
    member_locks: HashMap<String, Arc<Mutex<()>>>,
    cancel_tx: watch::Sender<bool>,
}

impl ConversationLoop {
    /// Create a loop over a roster, tool catalog, and model backend.
    pub fn new(
        registry: Arc<TeamRegistry>,
        dispatcher: Arc<ToolDispatcher>,
        model: Arc<dyn ModelBackend>,
    ) -> Self {
        let member_locks = registry
            .all()
            .iter()
            .map(|m| (m.name.clone(), Arc::new(Mutex::new(()))))
            .collect();
        let (cancel_tx, _) = watch::channel(false);
        Self {
            guard: CapabilityGuard::new(registry.clone()),
            registry,
            dispatcher,
            model,
            max_steps: DEFAULT_MAX_STEPS,
            member_locks,
            cancel_tx,
        }
    }

    /// Builder method to override the per-turn step budget.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Cooperatively cancel all outstanding turns. Each turn honors the
    /// signal at its next step or tool-call boundary.
    pub fn cancel(&self) {
        log::info!("cancelling outstanding turns");
        self.cancel_tx.send_replace(true);
    }

    /// Dispatch one user utterance to its resolved member set in `mode`.
    ///
    /// Returns after every member turn reached a terminal outcome. Results
    /// preserve resolution order regardless of completion order; failures
    /// in one member's turn never affect another's.
    pub async fn dispatch(&self, utterance: &str, mode: Capability) -> TeamReport {
        let resolution = mention::resolve(&self.registry, utterance);
        let warnings: Vec<String> = resolution
            .unknown
            .iter()
            .map(|token| {
                log::warn!("unknown mention '@{token}' ignored");
                format!("unknown mention '@{token}' ignored")
            })
            .collect();
        log::info!(
            "dispatching to {:?} in {mode} mode",
            resolution.names()
        );

        let handles: Vec<TurnHandle> = resolution
            .members
            .into_iter()
            .map(|member| self.spawn_member_turn(member, utterance, mode))
            .collect();

        // join_all keeps resolution order; completion order is irrelevant.
        let results = futures::future::join_all(handles.into_iter().map(|handle| async move {
            match handle {
                TurnHandle::Denied(result) => result,
                TurnHandle::Running { member, join } => {
                    let outcome = match join.await {
                        Ok(outcome) => attribute(&member, outcome),
                        Err(e) => TurnOutcome::Errored(TurnError::ModelFailure {
                            reason: format!("turn task failed: {e}"),
                        }),
                    };
                    MemberResult { member, outcome }
                }
            }
        }))
        .await;

        TeamReport { results, warnings }
    }

    /// Capability-check a member and, if cleared, spawn its turn task.
    ///
    /// The check happens here, once per member per utterance, before any
    /// turn exists. Denied members get a redirect result and never reach the
    /// dispatcher or the model.
    fn spawn_member_turn(
        &self,
        member: Member,
        utterance: &str,
        mode: Capability,
    ) -> TurnHandle {
        if let Err(denied) = self.guard.check(&member, mode) {
            log::info!("{denied}");
            return TurnHandle::Denied(MemberResult {
                member: member.name.clone(),
                outcome: TurnOutcome::Denied(denied),
            });
        }

        let lock = self
            .member_locks
            .get(&member.name)
            .cloned()
            .expect("resolved member is on the roster");
        let model = Arc::clone(&self.model);
        let dispatcher = Arc::clone(&self.dispatcher);
        let mut cancel = self.cancel_tx.subscribe();
        let max_steps = self.max_steps;
        let name = member.name.clone();
        let task_text = format!("@{}: {}", member.name, utterance.trim());

        let join = tokio::spawn(async move {
            let _active = lock.lock().await;
            let mut turn = Turn::new(member, task_text).with_max_steps(max_steps);
            match mode {
                Capability::Agent => {
                    turn.drive(model.as_ref(), dispatcher.as_ref(), &mut cancel).await
                }
                Capability::Chat => turn.drive_chat(model.as_ref(), &mut cancel).await,
            }
        });

        TurnHandle::Running { member: name, join }
    }
}

enum TurnHandle {
    /// Refused before a turn existed.
    Denied(MemberResult),
    /// A spawned turn task.
    Running {
        member: String,
        join: JoinHandle<TurnOutcome>,
    },
}

/// Prefix a completed answer with its member attribution, unless the model
/// already did.
fn attribute(member: &str, outcome: TurnOutcome) -> TurnOutcome {
    match outcome {
        TurnOutcome::Completed { answer } => {
            let prefix = format!("From '{member}':");
            if answer.trim_start().starts_with(&prefix) {
                TurnOutcome::Completed { answer }
            } else {
                TurnOutcome::Completed {
                    answer: format!("{prefix}\n{answer}"),
                }
            }
        }
        other => other,
    }
}
