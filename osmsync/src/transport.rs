//! HTTP transport abstraction for testability.
//!
//! Two seams connect the service to the network:
//!
//! - [`Transport`]: unauthenticated GET of an absolute URL
//! - [`AuthSession`]: the credentialed channel used for reads and writes
//!   once the user has signed in
//!
//! [`ReqwestTransport`] and [`TokenSession`] are the reqwest-backed
//! implementations. Both map a non-success HTTP status to
//! [`OsmError::Transport`] carrying that status, so the service can tell
//! authorization and rate-limit failures apart.

use std::future::Future;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::error::OsmError;

/// Default User-Agent string for API requests.
const DEFAULT_USER_AGENT: &str = concat!("osmsync/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Content type of XML request bodies.
pub const XML_CONTENT_TYPE: &str = "text/xml";

/// HTTP method of an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request relative to the API root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path and query, starting with `/`.
    pub path: String,
    pub body: Option<String>,
    pub content_type: Option<&'static str>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
            content_type: None,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(path)
        }
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self {
            method: Method::Put,
            ..Self::get(path)
        }
    }

    /// Attaches an XML body.
    pub fn with_xml(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.content_type = Some(XML_CONTENT_TYPE);
        self
    }

    /// True if the request only reads.
    pub fn is_read(&self) -> bool {
        self.method == Method::Get
    }
}

/// Unauthenticated read access to the API.
pub trait Transport: Send + Sync + 'static {
    /// Performs a GET of an absolute URL, returning the response body.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, OsmError>> + Send;
}

/// A credentialed session with the API.
///
/// The session owns the credentials; the service only asks whether they are
/// present and routes requests through it while they are.
pub trait AuthSession: Send + Sync + 'static {
    /// True while credentials are held.
    fn authenticated(&self) -> bool;

    /// Sends a request with credentials, returning the response body.
    fn xhr(&self, request: ApiRequest) -> impl Future<Output = Result<Vec<u8>, OsmError>> + Send;

    /// Establishes credentials.
    fn authenticate(&self) -> impl Future<Output = Result<(), OsmError>> + Send;

    /// Drops credentials.
    fn logout(&self);

    /// Points the session at another API root.
    fn set_url_root(&self, url_root: &str);
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client, OsmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(DEFAULT_USER_AGENT)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| OsmError::transport(0, format!("Failed to create HTTP client: {}", e)))
}

/// Sends a prepared request and reads the body.
///
/// Network failures are reported with status 0.
async fn execute(
    request: reqwest::RequestBuilder,
    method: Method,
    url: &str,
) -> Result<Vec<u8>, OsmError> {
    trace!(method = %method, url = url, "HTTP request starting");

    let response = match request.send().await {
        Ok(resp) => {
            debug!(
                method = %method,
                url = url,
                status = resp.status().as_u16(),
                "HTTP response received"
            );
            resp
        }
        Err(e) => {
            warn!(
                method = %method,
                url = url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "HTTP request failed"
            );
            return Err(OsmError::transport(0, format!("Request failed: {}", e)));
        }
    };

    let status = response.status();
    if !status.is_success() {
        warn!(method = %method, url = url, status = status.as_u16(), "HTTP error status");
        let reason = status.canonical_reason().unwrap_or("error");
        return Err(OsmError::transport(
            status.as_u16(),
            format!("{} from {}", reason, url),
        ));
    }

    match response.bytes().await {
        Ok(bytes) => {
            trace!(url = url, bytes = bytes.len(), "HTTP response body read");
            Ok(bytes.to_vec())
        }
        Err(e) => {
            warn!(url = url, error = %e, "Failed to read response body");
            Err(OsmError::transport(
                status.as_u16(),
                format!("Failed to read response: {}", e),
            ))
        }
    }
}

/// Unauthenticated transport using reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with the default timeout.
    pub fn new() -> Result<Self, OsmError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a transport with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, OsmError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
        })
    }
}

impl Transport for ReqwestTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, OsmError> {
        execute(self.client.get(url), Method::Get, url).await
    }
}

/// Bearer-token session using reqwest.
///
/// `authenticate` installs the configured token; `logout` drops it until the
/// next `authenticate`.
pub struct TokenSession {
    client: reqwest::Client,
    url_root: RwLock<String>,
    configured: RwLock<Option<String>>,
    active: RwLock<Option<String>>,
}

impl TokenSession {
    /// Creates a signed-out session against `url_root`.
    pub fn new(url_root: impl Into<String>, timeout_secs: u64) -> Result<Self, OsmError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            url_root: RwLock::new(url_root.into()),
            configured: RwLock::new(None),
            active: RwLock::new(None),
        })
    }

    /// Builder: token that `authenticate` installs.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        *self.configured.write() = Some(token.into());
        self
    }

    /// Replaces the token `authenticate` installs.
    pub fn set_token(&self, token: Option<String>) {
        *self.configured.write() = token;
    }
}

impl AuthSession for TokenSession {
    fn authenticated(&self) -> bool {
        self.active.read().is_some()
    }

    async fn xhr(&self, request: ApiRequest) -> Result<Vec<u8>, OsmError> {
        let token = self.active.read().clone().ok_or(OsmError::NotAuthenticated)?;
        let url = format!("{}{}", self.url_root.read(), request.path);

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
        }
        .bearer_auth(token);

        if let Some(content_type) = request.content_type {
            builder = builder.header("Content-Type", content_type);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        execute(builder, request.method, &url).await
    }

    async fn authenticate(&self) -> Result<(), OsmError> {
        let token = self.configured.read().clone();
        match token {
            Some(token) => {
                *self.active.write() = Some(token);
                debug!("Session authenticated");
                Ok(())
            }
            None => Err(OsmError::NotAuthenticated),
        }
    }

    fn logout(&self) {
        *self.active.write() = None;
    }

    fn set_url_root(&self, url_root: &str) {
        *self.url_root.write() = url_root.to_string();
    }
}

#[cfg(test)]
pub(crate) mod mock;
