//! Domain layer for the authorizer.

pub mod arn;
pub mod claims;
pub mod error;
pub mod keys;
pub mod local_client;
pub mod policy;
pub mod roles;
pub mod service;
pub mod synthesizer;
pub mod verifier;

pub use error::{DomainError, ErrorClass};
pub use local_client::AuthorizerLocalClient;
pub use service::Service;
