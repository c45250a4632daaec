//! The model seam.
//!
//! The runtime never talks to a concrete model; it awaits raw step output
//! from whatever backend the embedder wires in. Backend failures are opaque
//! to the runtime and end only the turn that observed them.

use async_trait::async_trait;

use crate::step::Step;
use crate::team::Member;

/// Everything a backend gets to produce the next raw step output.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    /// The member whose turn is running.
    pub member: &'a Member,
    /// The task text the member was addressed with.
    pub task: &'a str,
    /// Steps committed so far in this turn, observations included.
    pub transcript: &'a [Step],
    /// Corrective feedback after a parse failure, if the previous output
    /// was rejected. The backend should surface it to the model verbatim.
    pub correction: Option<&'a str>,
}

/// An awaitable source of raw model-turn output.
///
/// One call produces one raw output: a block of tagged step text in agent
/// mode, or a plain reply in chat mode. Calls may be arbitrarily slow; the
/// runtime treats them as suspension points.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Produce the next raw output for the given turn state.
    async fn next_output(&self, request: ModelRequest<'_>) -> anyhow::Result<String>;
}
