//! Plugin API trait for role vocabularies.
//!
//! The authorizer consults every registered resolver for each role token on
//! the caller's credential. A token no resolver recognises is ignored.

use crate::models::RoleGrants;

/// Turns one role token into the resource grants it confers.
pub trait RoleResolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Resolve a role token, or `None` when the token is not part of this vocabulary.
    fn resolve(&self, role: &str) -> Option<RoleGrants>;
}
