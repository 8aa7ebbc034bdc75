//! Role vocabularies and their combination.

mod catalog;
mod functional;

use std::collections::HashSet;
use std::sync::Arc;

use authorizer_sdk::{RoleGrants, RoleKind, RoleResolver};

pub use catalog::RoleCatalog;
pub use functional::FunctionalRoleCompiler;

/// Resolves every role token against each vocabulary in turn.
///
/// The first resolver that recognises a token wins. Output is ordered with
/// legacy roles first (by catalog position), then functional roles in the
/// order they appeared on the token.
pub struct RoleResolvers {
    resolvers: Vec<Arc<dyn RoleResolver>>,
}

impl RoleResolvers {
    #[must_use]
    pub fn new(resolvers: Vec<Arc<dyn RoleResolver>>) -> Self {
        Self { resolvers }
    }

    #[must_use]
    pub fn resolve_all(&self, roles: &[String]) -> Vec<RoleGrants> {
        let mut seen = HashSet::new();
        let mut resolved: Vec<RoleGrants> = roles
            .iter()
            .filter(|role| seen.insert(role.as_str()))
            .filter_map(|role| {
                let found = self.resolvers.iter().find_map(|r| {
                    r.resolve(role).inspect(|_| {
                        tracing::trace!(role = %role, resolver = r.name(), "Role resolved");
                    })
                });
                if found.is_none() {
                    tracing::debug!(role = %role, "Ignoring unrecognised role");
                }
                found
            })
            .collect();
        resolved.sort_by_key(|r| match r.kind {
            RoleKind::Legacy { rank } => (0, rank),
            RoleKind::Functional => (1, 0),
        });
        resolved
    }
}
