//! Configuration for the authorizer.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, bail};
use authorizer_sdk::{HttpMethod, ResourceGrant};
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use jsonwebtoken::Algorithm;
use serde::Deserialize;

/// Environment prefix for overrides, e.g. `GATEKEEPER__AUTHORIZER__ISSUER`.
pub const ENV_PREFIX: &str = "GATEKEEPER__";

fn default_leeway() -> Duration {
    Duration::from_secs(30)
}

fn default_key_set_max_age() -> Duration {
    Duration::from_secs(600)
}

fn default_min_refresh_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_decision_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Immutable verifier and policy configuration, built once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorizerConfig {
    /// Expected `iss` claim.
    pub issuer: String,

    /// Accepted `aud` values (client ids).
    pub audiences: Vec<String>,

    /// URL of the JSON Web Key Set.
    pub jwks_url: String,

    /// Signing algorithms a token header may name.
    pub algorithms: Vec<Algorithm>,

    /// Clock skew tolerated on `exp` and `nbf`.
    #[serde(deserialize_with = "humantime_duration::deserialize")]
    pub leeway: Duration,

    /// Age after which the cached key set is fetched again.
    #[serde(deserialize_with = "humantime_duration::deserialize")]
    pub key_set_max_age: Duration,

    /// Minimum spacing between forced key set fetches.
    #[serde(deserialize_with = "humantime_duration::deserialize")]
    pub min_refresh_interval: Duration,

    #[serde(deserialize_with = "humantime_duration::deserialize")]
    pub fetch_timeout: Duration,

    /// Upper bound on a whole decision; slower decisions are rejected.
    #[serde(deserialize_with = "humantime_duration::deserialize")]
    pub decision_timeout: Duration,

    pub claims: ClaimNames,

    /// Identity-provider tenants (`tid`) allowed to call. Empty allows all.
    pub allowed_directory_tenants: Vec<String>,

    /// Per-client (audience) role allowlist. Roles outside the list are dropped.
    pub client_roles: HashMap<String, Vec<String>>,

    /// Emit an explicit Deny over the requested method when nothing is allowed.
    pub deny_on_empty: bool,

    /// Render grants against the requested stage instead of every stage.
    pub pin_stage: bool,

    /// Legacy catalog, in output order.
    pub legacy_roles: Vec<LegacyRole>,

    pub functional: FunctionalRolesConfig,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            audiences: Vec::new(),
            jwks_url: String::new(),
            algorithms: vec![Algorithm::RS256],
            leeway: default_leeway(),
            key_set_max_age: default_key_set_max_age(),
            min_refresh_interval: default_min_refresh_interval(),
            fetch_timeout: default_fetch_timeout(),
            decision_timeout: default_decision_timeout(),
            claims: ClaimNames::default(),
            allowed_directory_tenants: Vec::new(),
            client_roles: HashMap::new(),
            deny_on_empty: false,
            pin_stage: false,
            legacy_roles: default_legacy_roles(),
            functional: FunctionalRolesConfig::default(),
        }
    }
}

impl AuthorizerConfig {
    /// Extract the `authorizer` section from a figment and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error when the section cannot be deserialized or fails validation.
    pub fn from_figment(figment: &Figment) -> anyhow::Result<Self> {
        let cfg: Self = figment
            .extract_inner("authorizer")
            .context("invalid authorizer configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Figment reading an optional YAML file, then `GATEKEEPER__*` environment overrides.
    #[must_use]
    pub fn figment(path: Option<&std::path::Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.issuer.trim().is_empty() {
            bail!("authorizer.issuer must be set");
        }
        if self.audiences.iter().all(|a| a.trim().is_empty()) {
            bail!("authorizer.audiences must contain at least one client id");
        }
        let url = url::Url::parse(&self.jwks_url)
            .with_context(|| format!("authorizer.jwks_url '{}' is not a URL", self.jwks_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("authorizer.jwks_url must use http or https");
        }
        if self.algorithms.is_empty() {
            bail!("authorizer.algorithms must not be empty");
        }
        if self.fetch_timeout.is_zero() || self.decision_timeout.is_zero() {
            bail!("authorizer timeouts must be greater than zero");
        }
        for scope in &self.functional.scopes {
            if scope.name.is_empty() || scope.methods.is_empty() {
                bail!("functional scope '{}' needs a name and methods", scope.name);
            }
        }
        Ok(())
    }
}

/// Names of the claims the authorizer reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClaimNames {
    pub email: String,
    pub tenant: String,
    pub roles: String,
    pub directory_tenant: String,
}

impl Default for ClaimNames {
    fn default() -> Self {
        Self {
            email: "email".to_owned(),
            tenant: "ClinicID".to_owned(),
            roles: "roles".to_owned(),
            directory_tenant: "tid".to_owned(),
        }
    }
}

/// One legacy catalog entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyRole {
    pub role: String,
    pub grants: Vec<ResourceGrant>,
}

fn legacy(role: &str, grants: &[(HttpMethod, &str)]) -> LegacyRole {
    LegacyRole {
        role: role.to_owned(),
        grants: grants
            .iter()
            .map(|(method, resource)| ResourceGrant::new(*method, resource))
            .collect(),
    }
}

/// Built-in legacy catalog.
#[must_use]
pub fn default_legacy_roles() -> Vec<LegacyRole> {
    use HttpMethod::{Any, Get, Post, Put};

    vec![
        legacy("SystemAdmin.read", &[(Get, "*")]),
        legacy("SystemAdmin.write", &[(Any, "*")]),
        legacy("HeathrowDoctor.read", &[(Get, "clinics*")]),
        legacy("Applicants.Read", &[(Get, "applicant"), (Get, "applicant/*")]),
        legacy(
            "Applicants.Write",
            &[
                (Post, "applicant"),
                (Post, "applicant/*"),
                (Put, "applicant"),
                (Put, "applicant/*"),
            ],
        ),
        legacy(
            "Application.Read",
            &[(Get, "application"), (Get, "application/*")],
        ),
        legacy(
            "Application.Write",
            &[
                (Post, "application"),
                (Post, "application/*"),
                (Put, "application"),
                (Put, "application/*"),
            ],
        ),
        legacy("Clinics.Read", &[(Get, "clinics"), (Get, "clinics/*")]),
    ]
}

/// Vocabulary of `Entity.Scope` role tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FunctionalRolesConfig {
    pub scopes: Vec<ScopeRule>,
    /// Explicit entity to path mapping; other entities use their lower-cased name.
    pub entity_paths: HashMap<String, String>,
}

impl Default for FunctionalRolesConfig {
    fn default() -> Self {
        use HttpMethod::{Get, Patch, Post, Put};

        let rule = |name: &str, methods: Vec<HttpMethod>, target| ScopeRule {
            name: name.to_owned(),
            methods,
            target,
            preflight: true,
        };
        Self {
            scopes: vec![
                rule("read", vec![Get], ScopeTarget::Item),
                rule("write", vec![Put, Patch], ScopeTarget::Item),
                rule("ReadAll", vec![Get], ScopeTarget::Collection),
                rule("WriteAll", vec![Post], ScopeTarget::Collection),
            ],
            entity_paths: HashMap::new(),
        }
    }
}

/// What a scope suffix grants.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeRule {
    /// Suffix after the dot, matched case-sensitively.
    pub name: String,
    pub methods: Vec<HttpMethod>,
    pub target: ScopeTarget,
    /// Resources granted by this scope also get a CORS preflight allowance.
    #[serde(default)]
    pub preflight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeTarget {
    /// The entity path itself, e.g. `clinics`.
    Collection,
    /// Any single record below it, e.g. `clinics/*`.
    Item,
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
