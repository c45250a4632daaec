//! Team roster, mention routing, and capability enforcement.

pub mod guard;
pub mod member;
pub mod mention;
pub mod registry;

pub use guard::{CapabilityGuard, Denied};
pub use member::{Capability, CapabilitySet, Member};
pub use mention::{resolve, Resolution, ALL_MENTION};
pub use registry::{RosterError, TeamRegistry, TeamRegistryBuilder};
