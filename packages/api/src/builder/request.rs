//! Browser request construction
//!
//! Sets the headers variant selection reads: `User-Agent`, `Cookie`,
//! `If-None-Match` and `Accept-Encoding`.

use http::header::{ACCEPT_ENCODING, COOKIE, IF_NONE_MATCH, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};
use htmlspeed_engine::accelerator::PageRequest;
use htmlspeed_engine::variant::VISIT_COOKIE;
use url::Url;

/// Header constants for common HTTP headers
pub mod header {
    pub use http::header::*;
}

/// Fluent builder for a [`PageRequest`]
#[derive(Debug, Clone)]
#[must_use]
pub struct RequestBuilder {
    url: String,
    headers: HeaderMap,
}

impl RequestBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn from_url(url: &Url) -> Self {
        Self::new(url.as_str())
    }

    /// Append a header; values that are not valid header text are skipped.
    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(e) => {
                tracing::debug!(target: "htmlspeed::accelerator", header = %name, error = %e, "Skipping invalid header value");
            }
        }
        self
    }

    /// Add multiple headers without overwriting existing ones.
    pub fn headers<'a>(mut self, headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (name, value) in headers {
            match HeaderName::from_bytes(name.as_bytes()) {
                Ok(name) => self = self.header(name, value),
                Err(_) => continue, // Skip invalid header names
            }
        }
        self
    }

    pub fn user_agent(self, agent: &str) -> Self {
        self.header(USER_AGENT, agent)
    }

    pub fn cookie(self, cookie: &str) -> Self {
        self.header(COOKIE, cookie)
    }

    /// The visit cookie a browser sends back after its first visit.
    pub fn returning_visitor(self) -> Self {
        self.cookie(&format!("{VISIT_COOKIE}=1"))
    }

    /// Revalidate a copy the browser holds.
    pub fn if_none_match(self, etag: &str) -> Self {
        self.header(IF_NONE_MATCH, etag)
    }

    pub fn accept_gzip(self) -> Self {
        self.header(ACCEPT_ENCODING, "gzip, deflate")
    }

    pub fn build(self) -> PageRequest {
        PageRequest {
            url: self.url,
            headers: self.headers,
        }
    }
}

impl From<RequestBuilder> for PageRequest {
    fn from(builder: RequestBuilder) -> Self {
        builder.build()
    }
}
