//! JSON Web Key Set over HTTP(S).

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use hyper::{Request, Uri, header};
use http_body_util::{BodyExt, Empty, Limited};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use jsonwebtoken::jwk::JwkSet;

use crate::domain::keys::{KeySetError, KeySetSource};

/// Largest key set document accepted.
const MAX_JWKS_BYTES: usize = 1024 * 1024;

type HttpsClient = Client<HttpsConnector<HttpConnector>, Empty<Bytes>>;

/// Fetches the key set from the identity provider's JWKS endpoint.
pub struct HttpKeySetSource {
    client: HttpsClient,
    url: Uri,
}

impl HttpKeySetSource {
    /// # Errors
    ///
    /// Returns an error when `jwks_url` is not a valid URI or TLS cannot be set up.
    pub fn new(jwks_url: &str) -> anyhow::Result<Self> {
        let url: Uri = jwks_url
            .parse()
            .with_context(|| format!("invalid JWKS URL '{jwks_url}'"))?;

        let native = rustls_native_certs::load_native_certs();
        for e in &native.errors {
            tracing::warn!(error = %e, "Failed to load a native root certificate");
        }
        let mut roots = rustls::RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        tracing::debug!(added, ignored, "Loaded native root certificates");

        let tls = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::aws_lc_rs::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .context("TLS protocol setup failed")?
        .with_root_certificates(roots)
        .with_no_client_auth();

        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .build();

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
            url,
        })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    #[tracing::instrument(skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        let request = Request::get(self.url.clone())
            .header(header::ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| KeySetError::Fetch(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| KeySetError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::Fetch(format!("unexpected status {status}")));
        }

        let body = Limited::new(response.into_body(), MAX_JWKS_BYTES)
            .collect()
            .await
            .map_err(|e| KeySetError::Fetch(e.to_string()))?
            .to_bytes();

        serde_json::from_slice(&body).map_err(|e| KeySetError::Invalid(e.to_string()))
    }
}
