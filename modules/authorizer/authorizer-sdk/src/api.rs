//! Public API trait for the authorizer.

use async_trait::async_trait;

use crate::error::AuthorizerError;
use crate::models::{AuthorizationResult, AuthorizerRequest};

/// Public API trait for the authorizer.
///
/// The gateway calls this once per request that is not already covered by a
/// cached decision:
///
/// ```ignore
/// match authorizer.authorize(request).await {
///     Ok(decision) => gateway.cache(decision),
///     Err(AuthorizerError::Unauthorized) => return StatusCode::UNAUTHORIZED,
/// }
/// ```
#[async_trait]
pub trait AuthorizerClient: Send + Sync {
    /// Verify the caller's bearer token and compile their roles into a policy.
    ///
    /// A caller with no recognised roles still gets a result; it simply carries
    /// no Allow statements.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` for any missing or invalid credential
    async fn authorize(
        &self,
        request: AuthorizerRequest,
    ) -> Result<AuthorizationResult, AuthorizerError>;
}
