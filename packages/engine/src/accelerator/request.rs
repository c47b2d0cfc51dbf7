//! Browser-facing request and response types

use std::sync::Arc;

use bytes::Bytes;
use http::header::{
    ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, ETAG,
    HeaderMap, HeaderName, HeaderValue, IF_NONE_MATCH, SET_COOKIE, USER_AGENT, VARY,
};
use http::StatusCode;

use crate::http::ContentEncoding;
use crate::http::headers::header_lossy;
use crate::resource::Resource;
use crate::variant::{VISIT_COOKIE, Variant, Visit};

/// Pages are revalidated on every visit so the visit progression advances.
const PAGE_CACHE_CONTROL: &str = "max-age=0, must-revalidate";
const VISIT_COOKIE_MAX_AGE: u64 = 365 * 24 * 60 * 60;

/// A browser request for one URL
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Absolute URL as the browser asked for it
    pub url: String,
    pub headers: HeaderMap,
}

impl PageRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Add a header; invalid values are ignored.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(name, value);
        }
        self
    }

    #[must_use]
    pub fn if_none_match(&self) -> Option<&str> {
        header_lossy(&self.headers, &IF_NONE_MATCH)
    }

    #[must_use]
    pub fn cookie(&self) -> Option<&str> {
        header_lossy(&self.headers, &COOKIE)
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        header_lossy(&self.headers, &USER_AGENT)
    }

    /// `Accept-Encoding` lists gzip with a non-zero quality.
    #[must_use]
    pub fn accepts_gzip(&self) -> bool {
        self.headers.get_all(ACCEPT_ENCODING).iter().any(|value| {
            value.to_str().is_ok_and(|v| {
                v.split(',').any(|coding| {
                    let mut parts = coding.split(';');
                    let name = parts.next().unwrap_or_default().trim();
                    let refused = parts.any(|p| {
                        p.trim()
                            .strip_prefix("q=")
                            .and_then(|q| q.trim().parse::<f32>().ok())
                            .is_some_and(|q| q <= 0.0)
                    });
                    (name.eq_ignore_ascii_case("gzip") || name == "*") && !refused
                })
            })
        })
    }
}

/// Where a served body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// A cached resource
    Cache,
    /// Fetched and compiled for this request (or a request it waited on)
    Origin,
    /// Cached copy kept after its refresh failed
    Fallback,
    /// Relayed unchanged for a disabled domain
    Bypass,
}

/// The response to hand to the browser
#[derive(Debug, Clone)]
pub struct Served {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Variant the response was compiled for
    pub variant: Variant,
    pub from: ServedFrom,
    pub resource: Option<Arc<Resource>>,
}

impl Served {
    /// `200` with `resource`'s body in the best encoding the browser takes.
    pub(crate) fn resource(
        resource: Arc<Resource>,
        request: &PageRequest,
        variant: Variant,
        from: ServedFrom,
    ) -> Self {
        let (body, encoding) = resource.body(request.accepts_gzip());
        let mut headers = HeaderMap::new();
        insert(&mut headers, CONTENT_TYPE, &resource.content_type);
        if encoding != ContentEncoding::Identity {
            insert(&mut headers, CONTENT_ENCODING, encoding.encoding_name());
        }
        insert(&mut headers, CONTENT_LENGTH, &body.len().to_string());
        insert(&mut headers, VARY, "Accept-Encoding");
        if let Some(etag) = &resource.etag {
            insert(&mut headers, ETAG, etag);
        }
        if resource.is_page() {
            insert(&mut headers, CACHE_CONTROL, PAGE_CACHE_CONTROL);
            if variant.visit() == Some(Visit::First) {
                let cookie = format!("{VISIT_COOKIE}=1; Path=/; Max-Age={VISIT_COOKIE_MAX_AGE}");
                insert(&mut headers, SET_COOKIE, &cookie);
            }
        } else if resource.state_full {
            insert(&mut headers, CACHE_CONTROL, "private, max-age=0");
        } else {
            insert(&mut headers, CACHE_CONTROL, &format!("max-age={}", resource.max_age));
        }
        Self {
            status: StatusCode::OK,
            headers,
            body,
            variant,
            from,
            resource: Some(resource),
        }
    }

    /// A version URL: the content never changes under it.
    pub(crate) fn versioned(resource: Arc<Resource>, request: &PageRequest, max_age: u64) -> Self {
        let mut served = Self::resource(resource, request, Variant::NON_PAGE, ServedFrom::Cache);
        insert(
            &mut served.headers,
            CACHE_CONTROL,
            &format!("public, max-age={max_age}"),
        );
        served
    }

    pub(crate) fn not_modified(resource: Arc<Resource>, variant: Variant) -> Self {
        let mut headers = HeaderMap::new();
        if let Some(etag) = &resource.etag {
            insert(&mut headers, ETAG, etag);
        }
        insert(&mut headers, CACHE_CONTROL, PAGE_CACHE_CONTROL);
        Self {
            status: StatusCode::NOT_MODIFIED,
            headers,
            body: Bytes::new(),
            variant,
            from: ServedFrom::Cache,
            resource: Some(resource),
        }
    }

    /// Pass the origin's cookies for this browser along.
    #[must_use]
    pub(crate) fn with_cookies(mut self, cookies: Vec<HeaderValue>) -> Self {
        for cookie in cookies {
            self.headers.append(SET_COOKIE, cookie);
        }
        self
    }

    #[must_use]
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        header_lossy(&self.headers, name)
    }

    /// Every `Set-Cookie` value, in order.
    #[must_use]
    pub fn cookies(&self) -> Vec<&str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => {
            tracing::debug!(target: "htmlspeed::accelerator", header = %name, error = %e, "Unrepresentable header value");
        }
    }
}

/// Outcome of [`Accelerator::resolve`](super::Accelerator::resolve)
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Fresh cached resource
    Hit(Arc<Resource>),
    /// The browser's copy (by ETag) is current
    NotModified(Arc<Resource>),
    Miss,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_acceptance_honours_quality() {
        let accepts = |value: &str| PageRequest::get("http://a.com/").header(ACCEPT_ENCODING, value).accepts_gzip();
        assert!(accepts("gzip, deflate"));
        assert!(accepts("br;q=1.0, GZIP;q=0.5"));
        assert!(accepts("*"));
        assert!(!accepts("gzip;q=0"));
        assert!(!accepts("deflate, br"));
        assert!(!PageRequest::get("http://a.com/").accepts_gzip());
    }
}
