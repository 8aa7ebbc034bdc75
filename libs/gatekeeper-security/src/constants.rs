/// Tenant id carried by support staff who operate across every tenant.
///
/// The authorizer forwards it like any other tenant id; only
/// [`crate::AuthorizerContext::ensure_tenant`] treats it specially.
pub const SUPPORT_TENANT_ID: &str = "SUPPORT";

/// Key of the tenant id in the context map forwarded by the gateway.
pub const TENANT_ID_KEY: &str = "tenantId";

/// Key of the caller email in the context map forwarded by the gateway.
pub const CALLER_EMAIL_KEY: &str = "callerEmail";
