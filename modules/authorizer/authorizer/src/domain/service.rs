//! Domain service for the authorizer: one decision per request.

use std::sync::Arc;
use std::time::Duration;

use authorizer_sdk::{AuthorizationResult, AuthorizerRequest, RoleResolver};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use super::arn::ResourceArn;
use super::claims::ClaimExtractor;
use super::error::DomainError;
use super::keys::KeySetCache;
use super::policy::PolicyBuilder;
use super::roles::{FunctionalRoleCompiler, RoleCatalog, RoleResolvers};
use super::synthesizer::synthesize;
use super::verifier::TokenVerifier;
use crate::config::AuthorizerConfig;

/// Authorizer service.
pub struct Service {
    verifier: TokenVerifier,
    claims: ClaimExtractor,
    roles: RoleResolvers,
    policy: PolicyBuilder,
    decision_timeout: Duration,
}

impl Service {
    /// Service with the configured legacy catalog and functional vocabulary.
    #[must_use]
    pub fn new(cfg: &AuthorizerConfig, keys: Arc<KeySetCache>) -> Self {
        let resolvers: Vec<Arc<dyn RoleResolver>> = vec![
            Arc::new(RoleCatalog::new(&cfg.legacy_roles)),
            Arc::new(FunctionalRoleCompiler::new(&cfg.functional)),
        ];
        Self::with_resolvers(cfg, keys, resolvers)
    }

    #[must_use]
    pub fn with_resolvers(
        cfg: &AuthorizerConfig,
        keys: Arc<KeySetCache>,
        resolvers: Vec<Arc<dyn RoleResolver>>,
    ) -> Self {
        Self {
            verifier: TokenVerifier::new(cfg, keys),
            claims: ClaimExtractor::new(cfg),
            roles: RoleResolvers::new(resolvers),
            policy: PolicyBuilder::new(cfg),
            decision_timeout: cfg.decision_timeout,
        }
    }

    /// Decide whether the caller may proceed and what else they may call.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] for a missing or malformed credential, an
    /// unparseable method ARN, a token that fails verification, or missing
    /// mandatory claims. A caller without recognised roles is not an error.
    #[tracing::instrument(skip_all, fields(request_id = request.request_id().unwrap_or("-")))]
    pub async fn authorize(
        &self,
        request: &AuthorizerRequest,
    ) -> Result<AuthorizationResult, DomainError> {
        let token = extract_token(request)?;
        let requested: ResourceArn = request.method_arn.parse()?;

        let verified = tokio::time::timeout(
            self.decision_timeout,
            self.verifier.verify(token.expose_secret()),
        )
        .await
        .map_err(|_| DomainError::DecisionTimeout(self.decision_timeout))??;

        let identity = self.claims.extract(&verified)?;
        let resolved = self.roles.resolve_all(&identity.roles);
        let statements = synthesize(&resolved);
        let result = self.policy.build(&identity, &statements, &requested);

        let allows = result.allows().count();
        info!(
            subject = %identity.subject,
            tenant_id = %identity.tenant_id,
            roles = identity.roles.len(),
            allows,
            outcome = if allows == 0 { "empty_allow" } else { "allow" },
            "Authorization decided"
        );
        Ok(result)
    }
}

/// Bearer token from the `Authorization` header, or from a TOKEN event's
/// `authorizationToken` when the header is absent.
fn extract_token(request: &AuthorizerRequest) -> Result<SecretString, DomainError> {
    let raw = request
        .header("Authorization")
        .or(request.authorization_token.as_deref())
        .ok_or(DomainError::MissingToken)?;

    let (scheme, token) = raw
        .trim()
        .split_once(' ')
        .ok_or(DomainError::MalformedAuthorization)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("Bearer") || token.is_empty() || token.contains(' ') {
        return Err(DomainError::MalformedAuthorization);
    }
    Ok(SecretString::from(token.to_owned()))
}
