//! Error types for the authorizer module.

use thiserror::Error;

/// Errors that can occur when using the authorizer API.
///
/// Every failure collapses into one opaque value so a caller can never learn
/// why a token was refused. The reason is logged on the authorizer side only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizerError {
    /// The request may not proceed; the gateway answers 401.
    #[error("Unauthorized")]
    Unauthorized,
}
