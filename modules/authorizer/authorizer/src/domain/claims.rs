//! Verified claims to caller identity.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::verifier::VerifiedToken;
use crate::config::{AuthorizerConfig, ClaimNames};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    #[error("tenant claim is missing or empty")]
    MissingTenantId,

    #[error("missing claim '{0}'")]
    MissingClaim(String),

    #[error("claim '{0}' has an unexpected type")]
    InvalidClaim(String),

    #[error("directory tenant '{0}' is not allowed")]
    DirectoryTenantNotAllowed(String),
}

/// Who is calling, on behalf of which tenant, holding which raw role tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: String,
    pub tenant_id: String,
    pub directory_tenant: Option<String>,
    pub roles: Vec<String>,
}

pub struct ClaimExtractor {
    names: ClaimNames,
    allowed_directory_tenants: HashSet<String>,
    client_roles: HashMap<String, HashSet<String>>,
}

impl ClaimExtractor {
    #[must_use]
    pub fn new(cfg: &AuthorizerConfig) -> Self {
        Self {
            names: cfg.claims.clone(),
            allowed_directory_tenants: cfg.allowed_directory_tenants.iter().cloned().collect(),
            client_roles: cfg
                .client_roles
                .iter()
                .map(|(client, roles)| (client.clone(), roles.iter().cloned().collect()))
                .collect(),
        }
    }

    /// # Errors
    ///
    /// Returns [`ClaimError`] when the tenant, email or role claim is missing,
    /// or the identity-provider tenant is not allowlisted.
    pub fn extract(&self, token: &VerifiedToken) -> Result<Identity, ClaimError> {
        let tenant_id = match token.claim(&self.names.tenant) {
            Some(Value::String(tenant)) if !tenant.trim().is_empty() => tenant.clone(),
            _ => return Err(ClaimError::MissingTenantId),
        };

        let email = match token.claim(&self.names.email) {
            Some(Value::String(email)) if !email.is_empty() => email.clone(),
            None | Some(Value::String(_) | Value::Null) => {
                return Err(ClaimError::MissingClaim(self.names.email.clone()));
            }
            Some(_) => return Err(ClaimError::InvalidClaim(self.names.email.clone())),
        };

        let directory_tenant = token
            .claim(&self.names.directory_tenant)
            .and_then(Value::as_str)
            .map(str::to_owned);
        if !self.allowed_directory_tenants.is_empty() {
            match &directory_tenant {
                Some(tid) if self.allowed_directory_tenants.contains(tid) => {}
                Some(tid) => return Err(ClaimError::DirectoryTenantNotAllowed(tid.clone())),
                None => {
                    return Err(ClaimError::MissingClaim(
                        self.names.directory_tenant.clone(),
                    ));
                }
            }
        }

        let roles = self.allowed_roles(token, self.raw_roles(token)?);

        Ok(Identity {
            subject: token.subject.clone(),
            email,
            tenant_id,
            directory_tenant,
            roles,
        })
    }

    fn raw_roles(&self, token: &VerifiedToken) -> Result<Vec<String>, ClaimError> {
        match token.claim(&self.names.roles) {
            Some(Value::Array(values)) => Ok(values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()),
            Some(Value::String(role)) => Ok(vec![role.clone()]),
            None | Some(Value::Null) => Err(ClaimError::MissingClaim(self.names.roles.clone())),
            Some(_) => Err(ClaimError::InvalidClaim(self.names.roles.clone())),
        }
    }

    /// Drop roles the calling client is not allowed to assert.
    fn allowed_roles(&self, token: &VerifiedToken, roles: Vec<String>) -> Vec<String> {
        let Some(allowed) = token
            .audience
            .iter()
            .find_map(|aud| self.client_roles.get(aud))
        else {
            return roles;
        };
        roles
            .into_iter()
            .filter(|role| {
                let keep = allowed.contains(role);
                if !keep {
                    tracing::debug!(role = %role, "Dropping role not allowed for client");
                }
                keep
            })
            .collect()
    }
}
