//! Infrastructure adapters for the authorizer.

pub mod jwks_http;

pub use jwks_http::HttpKeySetSource;
