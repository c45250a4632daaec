//! Capability enforcement.
//!
//! The guard validates a requested invocation mode against a member's
//! capability set before any turn is created. A denial is a value, not a
//! panic: it carries a redirect recommendation naming the first member in
//! roster order who does hold the capability, so callers can always answer
//! constructively instead of failing silently.

use std::fmt;
use std::sync::Arc;

use super::member::{Capability, Member};
use super::registry::TeamRegistry;

/// A capability mismatch between a member and a requested mode.
#[derive(Debug, Clone)]
pub struct Denied {
    /// The member that was asked to act.
    pub member: String,
    /// The mode the member lacks.
    pub mode: Capability,
    /// First member in roster order holding `mode`, if any.
    pub recommended: Option<String>,
}

impl fmt::Display for Denied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "member '{}' is not able to act in {} mode",
            self.member, self.mode
        )?;
        match &self.recommended {
            Some(name) => write!(f, "; ask '{name}' instead"),
            None => write!(f, "; no member on this team holds the {} capability", self.mode),
        }
    }
}

impl std::error::Error for Denied {}

/// Checks requested modes against the shared roster.
#[derive(Debug, Clone)]
pub struct CapabilityGuard {
    registry: Arc<TeamRegistry>,
}

impl CapabilityGuard {
    /// Create a guard over `registry`.
    pub fn new(registry: Arc<TeamRegistry>) -> Self {
        Self { registry }
    }

    /// Validate that `member` may act in `mode`.
    ///
    /// Checked once per member per utterance, before a turn exists:
    /// capability is a property of the member, not of step content.
    pub fn check(&self, member: &Member, mode: Capability) -> Result<(), Denied> {
        if member.can(mode) {
            return Ok(());
        }
        Err(Denied {
            member: member.name.clone(),
            mode,
            recommended: self.recommend(mode).map(|m| m.name.clone()),
        })
    }

    /// The first member in roster order holding `mode`.
    pub fn recommend(&self, mode: Capability) -> Option<&Member> {
        self.registry.all().iter().find(|m| m.can(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> CapabilityGuard {
        let registry = TeamRegistry::builder()
            .member(Member::new("Jason", "").with_capability(Capability::Chat))
            .member(
                Member::new("Dawson", "")
                    .with_capability(Capability::Chat)
                    .with_capability(Capability::Agent),
            )
            .member(
                Member::new("Riley", "")
                    .with_capability(Capability::Chat)
                    .with_capability(Capability::Agent),
            )
            .build()
            .unwrap();
        CapabilityGuard::new(Arc::new(registry))
    }

    #[test]
    fn test_agent_mode_denied_with_redirect() {
        let guard = guard();
        let jason = Member::new("Jason", "").with_capability(Capability::Chat);

        let denied = guard.check(&jason, Capability::Agent).unwrap_err();
        assert_eq!(denied.member, "Jason");
        assert_eq!(denied.mode, Capability::Agent);
        // First agent-capable member in roster order, not Riley.
        assert_eq!(denied.recommended.as_deref(), Some("Dawson"));
        assert!(denied.to_string().contains("ask 'Dawson' instead"));
    }

    #[test]
    fn test_capable_member_passes() {
        let guard = guard();
        let dawson = Member::new("Dawson", "")
            .with_capability(Capability::Chat)
            .with_capability(Capability::Agent);
        assert!(guard.check(&dawson, Capability::Agent).is_ok());
        assert!(guard.check(&dawson, Capability::Chat).is_ok());
    }

    #[test]
    fn test_no_capable_member_available() {
        let registry = TeamRegistry::builder()
            .member(Member::new("Jason", "").with_capability(Capability::Chat))
            .build()
            .unwrap();
        let guard = CapabilityGuard::new(Arc::new(registry));
        let jason = Member::new("Jason", "").with_capability(Capability::Chat);

        let denied = guard.check(&jason, Capability::Agent).unwrap_err();
        assert_eq!(denied.recommended, None);
        assert!(denied.to_string().contains("no member"));
    }

    #[test]
    fn test_chat_mode_denied_symmetrically() {
        let registry = TeamRegistry::builder()
            .member(Member::new("Silent", "").with_capability(Capability::Agent))
            .member(Member::new("Talker", "").with_capability(Capability::Chat))
            .build()
            .unwrap();
        let guard = CapabilityGuard::new(Arc::new(registry));
        let silent = Member::new("Silent", "").with_capability(Capability::Agent);

        let denied = guard.check(&silent, Capability::Chat).unwrap_err();
        assert_eq!(denied.recommended.as_deref(), Some("Talker"));
    }
}
