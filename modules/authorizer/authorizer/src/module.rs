//! Authorizer module wiring.

use std::sync::Arc;

use authorizer_sdk::AuthorizerClient;
use tracing::info;

use crate::config::AuthorizerConfig;
use crate::domain::keys::{KeySetCache, KeySetPolicy, KeySetSource};
use crate::domain::{AuthorizerLocalClient, Service};
use crate::infra::HttpKeySetSource;

/// Authorizer module.
///
/// Owns the process-wide key set cache and the service built on it. The key
/// set is not fetched here; the first decision populates it.
pub struct AuthorizerModule {
    service: Arc<Service>,
    keys: Arc<KeySetCache>,
}

impl AuthorizerModule {
    /// Wire the module against the configured JWKS endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or the HTTP client
    /// cannot be built.
    #[tracing::instrument(skip_all, fields(issuer = %cfg.issuer))]
    pub fn init(cfg: &AuthorizerConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        let source = Arc::new(HttpKeySetSource::new(&cfg.jwks_url)?);
        let module = Self::with_key_source(cfg, source);
        info!(
            jwks_url = %cfg.jwks_url,
            audiences = cfg.audiences.len(),
            legacy_roles = cfg.legacy_roles.len(),
            "Authorizer module initialized"
        );
        Ok(module)
    }

    /// Wire the module against any key source.
    #[must_use]
    pub fn with_key_source(cfg: &AuthorizerConfig, source: Arc<dyn KeySetSource>) -> Self {
        let keys = Arc::new(KeySetCache::new(
            source,
            KeySetPolicy {
                max_age: cfg.key_set_max_age,
                min_refresh_interval: cfg.min_refresh_interval,
                fetch_timeout: cfg.fetch_timeout,
            },
        ));
        let service = Arc::new(Service::new(cfg, Arc::clone(&keys)));
        Self { service, keys }
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn AuthorizerClient> {
        Arc::new(AuthorizerLocalClient::new(Arc::clone(&self.service)))
    }

    #[must_use]
    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.keys
    }
}
