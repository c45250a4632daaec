//! # teamloop
//!
//! A team-of-members AI orchestration runtime. One user utterance is routed
//! via `@mentions` to named team members, each member is gated by its
//! capability set, and every cleared member runs a bounded
//! thought/action/observation step loop against a pluggable model backend
//! and tool catalog until it produces a final answer.
//!
//! The crate deliberately stops at two seams: the model backend
//! ([`runtime::ModelBackend`]) and the tool catalog ([`tools::BaseTool`]).
//! Everything inside those seams (routing, capability enforcement, step
//! parsing, dispatch, bounded iteration, cancellation, and ordered
//! aggregation) is this crate's contract.

pub mod runtime;
pub mod step;
pub mod team;
pub mod tools;

pub use runtime::{
    ConversationLoop, MemberResult, ModelBackend, ModelRequest, TeamReport, Turn, TurnError,
    TurnOutcome, TurnState,
};
pub use step::{parse_output, Step, StepParseError, ToolCall};
pub use team::{
    Capability, CapabilityGuard, CapabilitySet, Denied, Member, Resolution, TeamRegistry,
};
pub use tools::{BaseTool, Tool, ToolArgs, ToolDispatcher};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
