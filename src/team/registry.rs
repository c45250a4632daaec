//! Immutable team roster.
//!
//! The registry is built once at startup and shared read-only for the life
//! of the process. Member order is declaration order, which makes `@all`
//! fan-out and redirect recommendations deterministic. Capability changes
//! require rebuilding the registry; there is no runtime mutation API.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::member::{Capability, Member};

/// File extension marking a member record in a team directory.
const MEMBER_EXT: &str = "member";

/// Errors raised while constructing a roster.
#[derive(Debug, Error)]
pub enum RosterError {
    /// Two members were declared with the same name.
    #[error("duplicate member name: {name}")]
    DuplicateMember { name: String },

    /// The given path is not a directory.
    #[error("not a team directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// A team directory contained no `*.member` files.
    #[error("no member files found in {}", path.display())]
    NoMembers { path: PathBuf },

    /// Filesystem error while reading a team directory.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The immutable, insertion-ordered team roster.
#[derive(Debug, Clone)]
pub struct TeamRegistry {
    members: Vec<Member>,
    index: HashMap<String, usize>,
}

impl TeamRegistry {
    /// Start building a roster.
    pub fn builder() -> TeamRegistryBuilder {
        TeamRegistryBuilder {
            members: Vec::new(),
        }
    }

    /// Build a roster from an already-collected member list.
    pub fn from_members(members: Vec<Member>) -> Result<Self, RosterError> {
        let mut index = HashMap::with_capacity(members.len());
        for (i, member) in members.iter().enumerate() {
            if index.insert(member.name.clone(), i).is_some() {
                return Err(RosterError::DuplicateMember {
                    name: member.name.clone(),
                });
            }
        }
        Ok(Self { members, index })
    }

    /// Build a roster from a team directory.
    ///
    /// Every `<name>.member` file contributes one member whose info is the
    /// trimmed file body. Sidecar files `<name>.chat` and `<name>.agent`
    /// assert the corresponding capability. Entries are taken in file-name
    /// order so the roster is deterministic across platforms.
    pub fn load_directory(dir: impl AsRef<Path>) -> Result<Self, RosterError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(RosterError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map_or(false, |ext| ext == MEMBER_EXT))
            .collect();
        paths.sort();

        let mut members = Vec::with_capacity(paths.len());
        for path in &paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                log::warn!("skipping member file with non-UTF-8 name: {}", path.display());
                continue;
            };
            let info = std::fs::read_to_string(path)?.trim().to_string();

            let mut member = Member::new(name, info);
            for (ext, capability) in [("chat", Capability::Chat), ("agent", Capability::Agent)] {
                if path.with_extension(ext).exists() {
                    member.capabilities.insert(capability);
                }
            }
            log::debug!("loaded member {} from {}", member, path.display());
            members.push(member);
        }

        if members.is_empty() {
            return Err(RosterError::NoMembers {
                path: dir.to_path_buf(),
            });
        }
        Self::from_members(members)
    }

    /// Look up a member by exact name.
    pub fn lookup(&self, name: &str) -> Option<&Member> {
        self.index.get(name).map(|&i| &self.members[i])
    }

    /// All members in declaration order.
    pub fn all(&self) -> &[Member] {
        &self.members
    }

    /// Number of members on the roster.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Render the roster as a prompt section for a manager system prompt:
    /// a `## Team Detail` heading followed by a fenced YAML block of the
    /// member records.
    pub fn team_prompt_section(&self) -> String {
        let yaml = serde_yaml::to_string(&self.members)
            .unwrap_or_else(|e| format!("# roster serialization failed: {e}\n"));
        format!("\n## Team Detail\n```yaml\n{yaml}```\n")
    }
}

/// Builder for [`TeamRegistry`].
pub struct TeamRegistryBuilder {
    members: Vec<Member>,
}

impl TeamRegistryBuilder {
    /// Add a member to the roster.
    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    /// Finish the roster. Fails on duplicate member names.
    pub fn build(self) -> Result<TeamRegistry, RosterError> {
        TeamRegistry::from_members(self.members)
    }
}
