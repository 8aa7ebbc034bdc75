//! Bearer token verification against the cached key set.

use std::collections::HashSet;
use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde_json::{Map, Value};

use super::keys::{KeySetCache, KeySetError};
use crate::config::AuthorizerConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("algorithm {0:?} is not allowed")]
    UnsupportedAlgorithm(Algorithm),

    #[error("token header has no kid")]
    MissingKeyId,

    #[error("signing key '{0}' is not in the key set")]
    UnknownKeyId(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("issuer mismatch")]
    IssuerMismatch,

    #[error("audience mismatch")]
    AudienceMismatch,

    #[error("missing claim '{0}'")]
    MissingClaim(String),

    #[error("key set unavailable: {0}")]
    KeySetUnavailable(#[from] KeySetError),
}

/// Claims of a token whose signature, issuer, audience and lifetime checked out.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub subject: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub expiry: i64,
    pub claims: Map<String, Value>,
}

impl VerifiedToken {
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

pub struct TokenVerifier {
    keys: Arc<KeySetCache>,
    issuer: String,
    audiences: Vec<String>,
    algorithms: Vec<Algorithm>,
    leeway_secs: u64,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(cfg: &AuthorizerConfig, keys: Arc<KeySetCache>) -> Self {
        Self {
            keys,
            issuer: cfg.issuer.clone(),
            audiences: cfg.audiences.clone(),
            algorithms: cfg.algorithms.clone(),
            leeway_secs: cfg.leeway.as_secs(),
        }
    }

    /// Verify `token`, forcing one key set refresh if its signing key is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] for any check that fails. A key that is still
    /// unknown after the refresh surfaces as `UnknownKeyId`.
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        match self.verify_once(token).await {
            Err(VerifyError::UnknownKeyId(kid)) => {
                tracing::warn!(kid = %kid, "JWKS miss, forcing key set refresh");
                self.keys.refresh(true).await?;
                self.verify_once(token).await
            }
            other => other,
        }
    }

    async fn verify_once(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        let header = decode_header(token).map_err(map_jwt_error)?;
        if !self.algorithms.contains(&header.alg) {
            return Err(VerifyError::UnsupportedAlgorithm(header.alg));
        }
        let kid = header.kid.ok_or(VerifyError::MissingKeyId)?;

        let keys = self.keys.get().await?;
        let Some(key) = keys.find(&kid) else {
            tracing::debug!(
                kid = %kid,
                known = ?keys.key_ids().collect::<Vec<_>>(),
                "Signing key not in key set"
            );
            return Err(VerifyError::UnknownKeyId(kid));
        };

        let data = decode::<Map<String, Value>>(token, key, &self.validation(header.alg))
            .map_err(map_jwt_error)?;
        to_verified(data.claims)
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&self.audiences);
        validation.required_spec_claims = ["exp", "iss", "aud", "sub"]
            .into_iter()
            .map(str::to_owned)
            .collect::<HashSet<_>>();
        validation.validate_nbf = true;
        validation.leeway = self.leeway_secs;
        validation
    }
}

fn to_verified(claims: Map<String, Value>) -> Result<VerifiedToken, VerifyError> {
    let string_claim = |name: &str| {
        claims
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| VerifyError::MissingClaim(name.to_owned()))
    };
    let subject = string_claim("sub")?;
    let issuer = string_claim("iss")?;
    let audience = match claims.get("aud") {
        Some(Value::String(aud)) => vec![aud.clone()],
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect(),
        _ => return Err(VerifyError::MissingClaim("aud".to_owned())),
    };
    let expiry = claims
        .get("exp")
        .and_then(numeric_date)
        .ok_or_else(|| VerifyError::MissingClaim("exp".to_owned()))?;

    Ok(VerifiedToken {
        subject,
        issuer,
        audience,
        expiry,
        claims,
    })
}

/// JWT `NumericDate`, which may carry a fractional part; seconds are truncated.
#[allow(clippy::cast_possible_truncation)]
fn numeric_date(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|secs| secs.is_finite() && secs.abs() < 9.0e15)
            .map(|secs| secs.trunc() as i64)
    })
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> VerifyError {
    match e.kind() {
        ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
        ErrorKind::ExpiredSignature => VerifyError::Expired,
        ErrorKind::ImmatureSignature => VerifyError::NotYetValid,
        ErrorKind::InvalidIssuer => VerifyError::IssuerMismatch,
        ErrorKind::InvalidAudience => VerifyError::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) => VerifyError::MissingClaim(claim.clone()),
        _ => VerifyError::Malformed(e.to_string()),
    }
}
