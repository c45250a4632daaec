//! Team member identity and capabilities.
//!
//! A member is a named participant on the AI team. Each member carries a
//! capability set that gates which invocation modes the runtime may use for
//! it: `Chat` (plain conversational replies) and `Agent` (tool-executing
//! step loops). The set is asserted once when the roster is built and never
//! changes afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A named ability a member may or may not possess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// The member can answer conversationally.
    Chat,
    /// The member can run the tool-executing step loop.
    Agent,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Chat => write!(f, "chat"),
            Capability::Agent => write!(f, "agent"),
        }
    }
}

// ---------------------------------------------------------------------------
// CapabilitySet
// ---------------------------------------------------------------------------

/// An enumerable set of [`Capability`] values.
///
/// Membership queries are pure; there is no removal API because rosters are
/// immutable once constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet {
    bits: u8,
}

const fn bit(capability: Capability) -> u8 {
    match capability {
        Capability::Chat => 0b01,
        Capability::Agent => 0b10,
    }
}

impl CapabilitySet {
    /// The empty set.
    pub const EMPTY: CapabilitySet = CapabilitySet { bits: 0 };

    /// Return a copy of this set with `capability` added.
    pub const fn with(self, capability: Capability) -> Self {
        CapabilitySet {
            bits: self.bits | bit(capability),
        }
    }

    /// Add `capability` to the set.
    pub fn insert(&mut self, capability: Capability) {
        self.bits |= bit(capability);
    }

    /// Whether `capability` is in the set.
    pub const fn contains(self, capability: Capability) -> bool {
        self.bits & bit(capability) != 0
    }

    /// Number of capabilities in the set.
    pub const fn len(self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Iterate the capabilities in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        [Capability::Chat, Capability::Agent]
            .into_iter()
            .filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::EMPTY;
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// A named AI team member.
///
/// Serializes through the roster wire shape used in team prompts:
///
/// ```yaml
/// member_name: Dawson
/// member_info: Infrastructure specialist.
/// is_able_to_call_chat: true
/// is_able_to_call_agent: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MemberRecord", from = "MemberRecord")]
pub struct Member {
    /// Unique member name, matched case-sensitively by mentions.
    pub name: String,
    /// Free-text blurb describing the member.
    pub info: String,
    /// Capabilities asserted at roster construction.
    pub capabilities: CapabilitySet,
}

impl Member {
    /// Create a member with an empty capability set.
    pub fn new(name: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            info: info.into(),
            capabilities: CapabilitySet::EMPTY,
        }
    }

    /// Builder method to add a capability.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Whether this member possesses `capability`.
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.capabilities)
    }
}

/// Serde bridge carrying the flat flag shape of roster records.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemberRecord {
    member_name: String,
    #[serde(default)]
    member_info: String,
    #[serde(default)]
    is_able_to_call_chat: bool,
    #[serde(default)]
    is_able_to_call_agent: bool,
}

impl From<Member> for MemberRecord {
    fn from(member: Member) -> Self {
        MemberRecord {
            member_name: member.name,
            member_info: member.info,
            is_able_to_call_chat: member.capabilities.contains(Capability::Chat),
            is_able_to_call_agent: member.capabilities.contains(Capability::Agent),
        }
    }
}

impl From<MemberRecord> for Member {
    fn from(record: MemberRecord) -> Self {
        let mut capabilities = CapabilitySet::EMPTY;
        if record.is_able_to_call_chat {
            capabilities.insert(Capability::Chat);
        }
        if record.is_able_to_call_agent {
            capabilities.insert(Capability::Agent);
        }
        Member {
            name: record.member_name,
            info: record.member_info,
            capabilities,
        }
    }
}
