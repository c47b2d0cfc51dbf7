//! External collaborators: origin fetch, image optimization, CDN mapping
//! and host health
//!
//! The accelerator never speaks HTTP itself. Implementations of these traits
//! are supplied by the embedding server; [`HostHealth`], [`NoCdn`] and
//! [`PassThroughImages`] are usable defaults.

pub mod health;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, Method, StatusCode};

pub use health::{HealthTracker, HostHealth};

/// Why an origin exchange produced no response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("connection to origin failed: {0}")]
    Connect(String),
    #[error("origin exchange timed out")]
    Timeout,
    #[error("malformed origin response: {0}")]
    Malformed(String),
    #[error("origin closed the connection")]
    Closed,
}

impl FetchFailure {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchFailure::Timeout)
    }
}

/// One request towards the origin
#[derive(Debug, Clone)]
pub struct OriginRequest {
    pub method: Method,
    pub scheme: String,
    /// `host[:port]`
    pub authority: String,
    /// Path and query
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl OriginRequest {
    #[must_use]
    pub fn get(scheme: &str, authority: &str, path: &str) -> Self {
        Self {
            method: Method::GET,
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority, self.path)
    }
}

/// Origin response; the body may still carry a `Content-Encoding`.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OriginResponse {
    #[must_use]
    pub fn ok(headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            reason: None,
            headers,
            body: body.into(),
        }
    }
}

/// HTTP client towards origin servers
pub trait OriginFetch: Send + Sync {
    fn fetch(&self, request: OriginRequest) -> BoxFuture<'_, Result<OriginResponse, FetchFailure>>;
}

/// JPEG re-encoder
pub trait ImageOptimizer: Send + Sync {
    /// Recompressed bytes, or `None` to keep the original.
    fn optimize(&self, image: &[u8], quality: u8) -> Option<Bytes>;
}

/// Keeps every image as fetched
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughImages;

impl ImageOptimizer for PassThroughImages {
    fn optimize(&self, _image: &[u8], _quality: u8) -> Option<Bytes> {
        None
    }
}

/// CDN origins replacing `scheme://host` of a resource URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnUrls {
    pub http: String,
    pub https: String,
}

impl CdnUrls {
    /// Prefix for a page served over `https` or plain http.
    #[must_use]
    pub fn prefix(&self, https: bool) -> &str {
        if https { &self.https } else { &self.http }
    }
}

/// Host mapping rules for CDN offload
pub trait CdnLookup: Send + Sync {
    fn lookup(&self, host: &str, size: usize) -> Option<CdnUrls>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoCdn;

impl CdnLookup for NoCdn {
    fn lookup(&self, _host: &str, _size: usize) -> Option<CdnUrls> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_is_reassembled() {
        let req = OriginRequest::get("https", "a.com:8443", "/x?y=1");
        assert_eq!(req.url(), "https://a.com:8443/x?y=1");
        assert_eq!(req.method, Method::GET);
    }

    #[test]
    fn cdn_prefix_follows_page_scheme() {
        let urls = CdnUrls {
            http: "http://cdn.a.com".into(),
            https: "https://cdn.a.com".into(),
        };
        assert_eq!(urls.prefix(true), "https://cdn.a.com");
        assert_eq!(urls.prefix(false), "http://cdn.a.com");
        assert!(NoCdn.lookup("a.com", 10).is_none());
        assert!(PassThroughImages.optimize(b"jpg", 80).is_none());
    }
}
