//! Authorizer SDK
//!
//! This crate provides the public API for the `authorizer` module:
//!
//! - [`AuthorizerClient`] - Public API trait for consumers
//! - [`RoleResolver`] - Plugin API trait for role vocabularies
//! - [`AuthorizerRequest`] / [`AuthorizationResult`] - Gateway event and decision models
//! - [`AuthorizerError`] - The single opaque rejection
//!
//! ## Usage
//!
//! ```ignore
//! use authorizer_sdk::AuthorizerClient;
//!
//! let decision = authorizer.authorize(request).await?;
//! let tenant = decision.context.tenant_id();
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;
pub mod plugin_api;

// Re-export main types at crate root
pub use api::AuthorizerClient;
pub use error::AuthorizerError;
pub use models::{
    AuthorizationResult, AuthorizerRequest, Effect, HttpMethod, INVOKE_ACTION, POLICY_VERSION,
    PolicyDocument, RequestContext, ResourceGrant, RoleGrants, RoleKind, Statement,
    UNAUTHORISED_PRINCIPAL,
};
pub use plugin_api::RoleResolver;
