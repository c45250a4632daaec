//! Mention resolution.
//!
//! Scans an utterance for `@name` tokens and resolves them to a target
//! member set. `@all` is reserved and short-circuits to the full roster, as
//! does the absence of any recognized mention. Resolution is a plain
//! whitespace tokenizer, deterministic and pure: same utterance, same
//! ordered result.

use serde::Serialize;

use super::member::Member;
use super::registry::TeamRegistry;

/// The reserved mention matching every member.
pub const ALL_MENTION: &str = "all";

/// The outcome of resolving mentions against a roster.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Target members, duplicate-free, in first-seen mention order
    /// (roster order when the full roster is selected).
    pub members: Vec<Member>,
    /// Mention tokens that matched no member. Ignored for targeting but
    /// surfaced so the caller can warn instead of silently dropping them.
    pub unknown: Vec<String>,
}

impl Resolution {
    /// The resolved member names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Resolve the `@` mentions in `utterance` against `registry`.
///
/// Identifier rule: a token starting with `@` mentions the contiguous
/// non-whitespace text after the `@`, matched case-sensitively against
/// registry names. If `@all` appears, or no token matches a member, the
/// result is the full roster in declaration order.
pub fn resolve(registry: &TeamRegistry, utterance: &str) -> Resolution {
    let mut members: Vec<Member> = Vec::new();
    let mut unknown: Vec<String> = Vec::new();
    let mut all_requested = false;

    for token in utterance.split_whitespace() {
        let Some(name) = token.strip_prefix('@') else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        if name == ALL_MENTION {
            all_requested = true;
        } else if let Some(member) = registry.lookup(name) {
            if !members.iter().any(|m| m.name == member.name) {
                members.push(member.clone());
            }
        } else if !unknown.iter().any(|u| u == name) {
            unknown.push(name.to_string());
        }
    }

    if all_requested || members.is_empty() {
        members = registry.all().to_vec();
    }

    Resolution { members, unknown }
}
