//! Resolved roles to a minimal, ordered list of Allow statements.

use std::collections::HashSet;

use authorizer_sdk::{Effect, HttpMethod, ResourceGrant, RoleGrants, RoleKind};

/// A statement before its grants are rendered as ARNs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantStatement {
    pub effect: Effect,
    pub grants: Vec<ResourceGrant>,
}

impl GrantStatement {
    fn allow(grants: Vec<ResourceGrant>) -> Self {
        Self {
            effect: Effect::Allow,
            grants,
        }
    }
}

/// Merge resolved roles into Allow statements.
///
/// - Every `(method, resource)` pair appears once across the whole output.
/// - Legacy roles yield one statement each, holding the grants not already
///   emitted; a legacy role left with nothing new yields no statement.
/// - Functional roles yield one statement per grant.
/// - Every resource that got a non-OPTIONS grant from a preflight-flagged
///   functional role gets exactly one OPTIONS grant, after everything else.
///
/// `resolved` must already be in output order.
#[must_use]
pub fn synthesize(resolved: &[RoleGrants]) -> Vec<GrantStatement> {
    let mut seen: HashSet<ResourceGrant> = HashSet::new();
    let mut preflight: Vec<&str> = Vec::new();
    let mut statements = Vec::new();

    for role in resolved {
        match role.kind {
            RoleKind::Legacy { .. } => {
                let fresh: Vec<ResourceGrant> = role
                    .grants
                    .iter()
                    .filter(|grant| seen.insert((*grant).clone()))
                    .cloned()
                    .collect();
                if !fresh.is_empty() {
                    statements.push(GrantStatement::allow(fresh));
                }
            }
            RoleKind::Functional => {
                for grant in &role.grants {
                    if role.preflight
                        && grant.method != HttpMethod::Options
                        && !preflight.contains(&grant.resource.as_str())
                    {
                        preflight.push(&grant.resource);
                    }
                    if seen.insert(grant.clone()) {
                        statements.push(GrantStatement::allow(vec![grant.clone()]));
                    }
                }
            }
        }
    }

    for resource in preflight {
        let grant = ResourceGrant::new(HttpMethod::Options, resource);
        if seen.insert(grant.clone()) {
            statements.push(GrantStatement::allow(vec![grant]));
        }
    }

    statements
}
