//! Transport seam between the client core and the network.
//!
//! The core only ever needs `request(method, url, body) -> status +
//! bytes`; everything TLS-related lives behind this trait, which also
//! lets the test suite substitute a canned transport.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Raw response handed back to the core: status code and body bytes.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_status(&self, status: u16) -> bool {
        self.status == status
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<TransportResponse>;
}

/// Mutual-TLS transport over reqwest.
///
/// The registry authenticates distributors by client certificate; the
/// subscription service and the report service use distinct identities,
/// so a client may hold two instances of this type.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport from a PEM certificate/key pair and a fixed
    /// `Accept` header (`application/xml` for the subscription service,
    /// `application/json` for the report service).
    pub fn new(cert: &Path, key: &Path, accept: &'static str) -> Result<Self> {
        let mut pem = fs::read(cert)?;
        pem.extend(fs::read(key)?);
        let identity = reqwest::Identity::from_pem(&pem)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
        headers.insert(ACCEPT, HeaderValue::from_static(accept));

        let client = Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<TransportResponse> {
        let mut request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Delete => self.client.delete(url),
        };
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        tracing::debug!(%method, url, status, bytes = body.len(), "transport round trip");

        Ok(TransportResponse { status, body })
    }
}
