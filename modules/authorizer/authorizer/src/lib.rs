//! Authorizer Module
//!
//! Verifies gateway bearer tokens against the identity provider's rotating key
//! set and compiles the caller's role claims into an execute-api policy.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod infra;
pub mod module;

pub use config::AuthorizerConfig;
pub use module::AuthorizerModule;
