//! Domain errors for the authorizer.

use std::time::Duration;

use authorizer_sdk::AuthorizerError;

use super::arn::ArnError;
use super::claims::ClaimError;
use super::verifier::VerifyError;

/// Why a decision was rejected. Never leaves the process.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("no bearer token in request")]
    MissingToken,

    #[error("authorization value is not a bearer token")]
    MalformedAuthorization,

    #[error("invalid method ARN: {0}")]
    InvalidMethodArn(#[from] ArnError),

    #[error("token verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("claim extraction failed: {0}")]
    Claims(#[from] ClaimError),

    #[error("decision did not complete within {0:?}")]
    DecisionTimeout(Duration),
}

/// Coarse failure class, used to pick the log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is unusable.
    Transport,
    /// The token was checked and refused.
    Signature,
    /// The signing key was still unknown after the forced refresh.
    UnknownKeyId,
    /// The key endpoint could not be reached or timed out.
    Infrastructure,
    /// The token verified but lacks what we need.
    Claim,
}

impl ErrorClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Signature => "signature",
            Self::UnknownKeyId => "unknown_key_id",
            Self::Infrastructure => "infrastructure",
            Self::Claim => "claim",
        }
    }
}

impl DomainError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingToken | Self::MalformedAuthorization | Self::InvalidMethodArn(_) => {
                ErrorClass::Transport
            }
            Self::Verify(VerifyError::UnknownKeyId(_)) => ErrorClass::UnknownKeyId,
            Self::Verify(VerifyError::KeySetUnavailable(_)) | Self::DecisionTimeout(_) => {
                ErrorClass::Infrastructure
            }
            Self::Verify(_) => ErrorClass::Signature,
            Self::Claims(_) => ErrorClass::Claim,
        }
    }
}

impl From<DomainError> for AuthorizerError {
    fn from(_: DomainError) -> Self {
        Self::Unauthorized
    }
}
