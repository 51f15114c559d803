//! Agent identity: roles, agent cards, and the process-wide agent cache.
//!
//! Per spec.md section 9's REDESIGN FLAG ("role as a value, not a type"):
//! the original's `TeamRole` enum closes the set of roles at compile time
//! and raises on an unrecognized name via Python's `_missing_` hook. A
//! config-driven team can introduce new roles at load time, so here `Role`
//! is an interned, lowercase-canonicalized string (`Arc<str>`) registered
//! into a process-wide [`RoleRegistry`] — new roles just register, no enum
//! variant or code change required. This resolves SPEC_FULL.md's Open
//! Question 2 (role equality is case-insensitive by construction).

pub mod conversation;
pub mod core;
pub mod listener;
pub mod scratchpad;

use dashmap::DashSet;
use once_cell::sync::Lazy;
use std::sync::Arc;
use uuid::Uuid;

/// An interned, case-insensitive role name (`"researcher"`, `"coordinator"`,
/// ...). Two `Role`s with the same text, regardless of input casing or
/// surrounding whitespace, compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role(Arc<str>);

impl Role {
    pub fn new(name: impl AsRef<str>) -> Self {
        let canonical = name.as_ref().trim().to_lowercase();
        Role(Arc::from(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide set of roles that have been registered by some loaded team
/// config. Unlike the original's closed enum, looking up an unregistered
/// role is not an error here — registration just hasn't happened yet, e.g.
/// before a team config is loaded.
static ROLE_REGISTRY: Lazy<DashSet<Role>> = Lazy::new(DashSet::new);

/// Registers `role` as known to this process. Idempotent.
pub fn register_role(role: &Role) {
    ROLE_REGISTRY.insert(role.clone());
}

pub fn is_registered(role: &Role) -> bool {
    ROLE_REGISTRY.contains(role)
}

pub fn registered_roles() -> Vec<Role> {
    ROLE_REGISTRY.iter().map(|r| r.clone()).collect()
}

/// Identity and static description of one running agent instance.
#[derive(Debug, Clone)]
pub struct AgentCard {
    pub id: String,
    pub role: Role,
    pub chat_id: String,
    /// Display name; defaults to the role name when not set via
    /// [`AgentCard::with_profile`].
    pub name: String,
    pub description: String,
    pub model_name: Option<String>,
    pub tags: Vec<String>,
}

impl AgentCard {
    pub fn new(role: Role, chat_id: impl Into<String>) -> Self {
        let name = role.as_str().to_string();
        AgentCard {
            id: Uuid::new_v4().to_string(),
            role,
            chat_id: chat_id.into(),
            name,
            description: String::new(),
            model_name: None,
            tags: Vec::new(),
        }
    }

    /// Fills in the descriptive fields a [`crate::team::TeamOrchestrator`]
    /// already has from `RoleConfig` at build time.
    pub fn with_profile(
        mut self,
        description: impl Into<String>,
        model_name: Option<String>,
        tags: Vec<String>,
    ) -> Self {
        self.description = description.into();
        self.model_name = model_name;
        self.tags = tags;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_equality_ignores_case_and_whitespace() {
        assert_eq!(Role::new("Researcher"), Role::new(" researcher "));
        assert_ne!(Role::new("researcher"), Role::new("coordinator"));
    }

    #[test]
    fn register_role_is_idempotent_and_visible() {
        let role = Role::new("paper_search_expert");
        register_role(&role);
        register_role(&role);
        assert!(is_registered(&role));
        assert!(!is_registered(&Role::new("unregistered_role_xyz")));
    }
}
