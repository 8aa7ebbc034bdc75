//! Local (in-process) client for the authorizer.

use std::sync::Arc;

use async_trait::async_trait;
use authorizer_sdk::{AuthorizationResult, AuthorizerClient, AuthorizerError, AuthorizerRequest};

use super::error::ErrorClass;
use super::{DomainError, Service};

/// Local client wrapping the service.
pub struct AuthorizerLocalClient {
    svc: Arc<Service>,
}

impl AuthorizerLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

/// Log the rejection reason at a level matching its class, then make it opaque.
///
/// Cognitive complexity is inflated by tracing macro expansion.
#[allow(clippy::cognitive_complexity)]
fn log_and_convert(op: &str, e: DomainError) -> AuthorizerError {
    let class = e.class().as_str();
    match e.class() {
        ErrorClass::Transport | ErrorClass::Claim => {
            tracing::debug!(operation = op, class, error = %e, "authorizer rejected request");
        }
        ErrorClass::Signature | ErrorClass::UnknownKeyId => {
            tracing::warn!(operation = op, class, error = %e, "authorizer rejected token");
        }
        ErrorClass::Infrastructure => {
            tracing::error!(operation = op, class, error = ?e, "authorizer call failed");
        }
    }
    e.into()
}

#[async_trait]
impl AuthorizerClient for AuthorizerLocalClient {
    async fn authorize(
        &self,
        request: AuthorizerRequest,
    ) -> Result<AuthorizationResult, AuthorizerError> {
        self.svc
            .authorize(&request)
            .await
            .map_err(|e| log_and_convert("authorize", e))
    }
}
