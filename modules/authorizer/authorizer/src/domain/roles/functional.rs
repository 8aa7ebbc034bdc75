use std::collections::HashMap;

use authorizer_sdk::{ResourceGrant, RoleGrants, RoleKind, RoleResolver};

use crate::config::{FunctionalRolesConfig, ScopeRule, ScopeTarget};

/// Compiles `Entity.Scope` role tokens into grants.
///
/// The resource path of an entity is its configured override, or the entity
/// name lower-cased verbatim. Names are never pluralised or singularised.
pub struct FunctionalRoleCompiler {
    scopes: HashMap<String, ScopeRule>,
    entity_paths: HashMap<String, String>,
}

impl FunctionalRoleCompiler {
    #[must_use]
    pub fn new(cfg: &FunctionalRolesConfig) -> Self {
        Self {
            scopes: cfg
                .scopes
                .iter()
                .map(|rule| (rule.name.clone(), rule.clone()))
                .collect(),
            entity_paths: cfg.entity_paths.clone(),
        }
    }

    fn entity_path(&self, entity: &str) -> String {
        self.entity_paths
            .get(entity)
            .cloned()
            .unwrap_or_else(|| entity.to_lowercase())
    }
}

fn is_entity_name(entity: &str) -> bool {
    !entity.is_empty()
        && entity
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl RoleResolver for FunctionalRoleCompiler {
    fn name(&self) -> &'static str {
        "functional"
    }

    fn resolve(&self, role: &str) -> Option<RoleGrants> {
        let (entity, scope) = role.split_once('.')?;
        if !is_entity_name(entity) {
            return None;
        }
        let rule = self.scopes.get(scope)?;

        let path = self.entity_path(entity);
        let resource = match rule.target {
            ScopeTarget::Collection => path,
            ScopeTarget::Item => format!("{path}/*"),
        };
        Some(RoleGrants {
            role: role.to_owned(),
            kind: RoleKind::Functional,
            grants: rule
                .methods
                .iter()
                .map(|method| ResourceGrant::new(*method, &resource))
                .collect(),
            preflight: rule.preflight,
        })
    }
}
