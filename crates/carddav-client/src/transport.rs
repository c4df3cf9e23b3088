//! HTTP transport: one WebDAV round trip per call

use std::time::Duration;

use tracing::debug;

use crate::error::{CardDavError, Result};
use crate::models::Credential;

/// Client identifier sent with every request
pub const USER_AGENT: &str = concat!("carddav-client/", env!("CARGO_PKG_VERSION"));

/// HTTP methods the engine issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DavMethod {
    Options,
    Get,
    Propfind,
    Report,
    Put,
    Delete,
}

impl DavMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Options => "OPTIONS",
            Self::Get => "GET",
            Self::Propfind => "PROPFIND",
            Self::Report => "REPORT",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Discovery and report methods carry a `Depth: 1` header
    fn needs_depth(&self) -> bool {
        matches!(self, Self::Propfind | Self::Report)
    }
}

/// Raw status and body of one round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// True for the statuses that count as success on write-style calls
    pub fn is_success(&self) -> bool {
        matches!(self.status, 200 | 201 | 204 | 207)
    }

    /// Extract the body where data was expected; 200 and 207 qualify,
    /// anything else is a protocol error carrying the status.
    pub fn into_data(self) -> Result<String> {
        match self.status {
            200 | 207 => Ok(self.body),
            status => Err(CardDavError::Protocol {
                status,
                message: self.body,
            }),
        }
    }
}

/// One-request-at-a-time transport seam.
///
/// `Err` is reserved for connection-level failures (DNS, TLS, refused,
/// timeout); whatever status the server produced comes back as an
/// [`HttpResponse`] for the caller to interpret.
pub trait Transport {
    fn execute(
        &self,
        url: &str,
        method: DavMethod,
        body: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<HttpResponse>;
}

/// Blocking reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    credential: Option<Credential>,
}

impl HttpTransport {
    /// Build a transport with the given credentials and request timeout
    pub fn new(credential: Option<Credential>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CardDavError::Configuration(e.to_string()))?;

        Ok(Self { client, credential })
    }
}

impl Transport for HttpTransport {
    fn execute(
        &self,
        url: &str,
        method: DavMethod,
        body: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<HttpResponse> {
        debug!("{} {}", method.as_str(), url);

        let http_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| CardDavError::Configuration(e.to_string()))?;

        let mut request = self.client.request(http_method, url);

        if let Some(credential) = &self.credential {
            request = request.basic_auth(&credential.username, Some(&credential.password));
        }

        if method.needs_depth() {
            request = request.header("Depth", "1");
        }

        if let Some(body) = body.filter(|b| !b.is_empty()) {
            if let Some(content_type) = content_type {
                request = request.header("Content-Type", content_type);
            }
            request = request.body(body.to_string());
        }

        let response = request.send().map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(map_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> CardDavError {
    if error.is_timeout() {
        CardDavError::Timeout(error.to_string())
    } else {
        CardDavError::Connection(error.to_string())
    }
}
