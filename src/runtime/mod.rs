//! The orchestration runtime: model seam, turns, and the conversation loop.

pub mod conversation;
pub mod model;
pub mod turn;

pub use conversation::{ConversationLoop, MemberResult, TeamReport};
pub use model::{ModelBackend, ModelRequest};
pub use turn::{
    Turn, TurnError, TurnOutcome, TurnState, DEFAULT_MAX_PARSE_FAILURES, DEFAULT_MAX_STEPS,
};
