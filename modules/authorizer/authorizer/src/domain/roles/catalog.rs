use std::collections::HashMap;

use authorizer_sdk::{ResourceGrant, RoleGrants, RoleKind, RoleResolver};

use crate::config::LegacyRole;

/// Exact-match table of legacy role tokens.
pub struct RoleCatalog {
    entries: Vec<Vec<ResourceGrant>>,
    index: HashMap<String, usize>,
}

impl RoleCatalog {
    #[must_use]
    pub fn new(roles: &[LegacyRole]) -> Self {
        let mut entries = Vec::with_capacity(roles.len());
        let mut index = HashMap::with_capacity(roles.len());
        for role in roles {
            if index.contains_key(&role.role) {
                tracing::warn!(role = %role.role, "Duplicate legacy role ignored");
                continue;
            }
            index.insert(role.role.clone(), entries.len());
            entries.push(role.grants.clone());
        }
        Self { entries, index }
    }
}

impl RoleResolver for RoleCatalog {
    fn name(&self) -> &'static str {
        "legacy-catalog"
    }

    fn resolve(&self, role: &str) -> Option<RoleGrants> {
        let rank = *self.index.get(role)?;
        Some(RoleGrants {
            role: role.to_owned(),
            kind: RoleKind::Legacy { rank },
            grants: self.entries[rank].clone(),
            preflight: false,
        })
    }
}
