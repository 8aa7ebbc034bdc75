use serde_json::{Map, Value};

use crate::constants::{CALLER_EMAIL_KEY, SUPPORT_TENANT_ID, TENANT_ID_KEY};

/// `AuthorizerContext` is the identity summary attached to every authorization decision.
///
/// Built by the authorizer from verified claims and forwarded by the gateway to
/// downstream handlers, which use it to scope every record they touch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerContext {
    /// Tenant (clinic) the caller belongs to, copied verbatim from the token.
    tenant_id: String,
    /// Email address of the caller, used for audit fields such as `createdBy`.
    caller_email: String,
}

/// Failure to rebuild an [`AuthorizerContext`] from a gateway context map.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("authorizer context is missing '{0}'")]
    MissingField(&'static str),

    #[error("authorizer context field '{0}' is not a string")]
    NotAString(&'static str),
}

/// A handler attempted to touch a record owned by another tenant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tenant '{caller}' may not access records of tenant '{owner}'")]
pub struct TenantAccessError {
    pub caller: String,
    pub owner: String,
}

impl AuthorizerContext {
    /// Create a new `AuthorizerContext` builder
    #[must_use]
    pub fn builder() -> AuthorizerContextBuilder {
        AuthorizerContextBuilder::default()
    }

    /// Rebuild the context from the flat string map the gateway hands to handlers.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when either key is absent or not a string.
    pub fn from_gateway_map(map: &Map<String, Value>) -> Result<Self, ContextError> {
        Ok(Self {
            tenant_id: string_field(map, TENANT_ID_KEY)?,
            caller_email: string_field(map, CALLER_EMAIL_KEY)?,
        })
    }

    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    #[must_use]
    pub fn caller_email(&self) -> &str {
        &self.caller_email
    }

    /// True when the caller carries the support sentinel tenant id.
    #[must_use]
    pub fn is_support(&self) -> bool {
        self.tenant_id == SUPPORT_TENANT_ID
    }

    /// Check that the caller may touch a record owned by `owner_tenant_id`.
    ///
    /// Support callers pass for any owner.
    ///
    /// # Errors
    ///
    /// Returns [`TenantAccessError`] when the owner differs from the caller's tenant.
    pub fn ensure_tenant(&self, owner_tenant_id: &str) -> Result<(), TenantAccessError> {
        if self.is_support() || self.tenant_id == owner_tenant_id {
            return Ok(());
        }
        Err(TenantAccessError {
            caller: self.tenant_id.clone(),
            owner: owner_tenant_id.to_owned(),
        })
    }
}

fn string_field(map: &Map<String, Value>, key: &'static str) -> Result<String, ContextError> {
    match map.get(key) {
        None | Some(Value::Null) => Err(ContextError::MissingField(key)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ContextError::NotAString(key)),
    }
}

#[derive(Default)]
pub struct AuthorizerContextBuilder {
    tenant_id: Option<String>,
    caller_email: Option<String>,
}

impl AuthorizerContextBuilder {
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: &str) -> Self {
        self.tenant_id = Some(tenant_id.to_owned());
        self
    }

    #[must_use]
    pub fn caller_email(mut self, caller_email: &str) -> Self {
        self.caller_email = Some(caller_email.to_owned());
        self
    }

    #[must_use]
    pub fn build(self) -> AuthorizerContext {
        AuthorizerContext {
            tenant_id: self.tenant_id.unwrap_or_default(),
            caller_email: self.caller_email.unwrap_or_default(),
        }
    }
}
