//! Header helpers over `http::HeaderMap`
//!
//! Case-insensitive lookups are free with `HeaderMap`; these helpers add the
//! string extraction and `Cache-Control` parsing the freshness logic needs.

use http::{HeaderMap, HeaderName, header};
use thiserror::Error;

/// Header-related errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Represents an error when a header value is not visible ASCII.
    #[error("Invalid header value for {name}: {message}")]
    InvalidHeaderValue { name: String, message: String },
}

/// Header value as `&str`; absent headers are `Ok(None)`.
///
/// # Errors
///
/// Returns `HeaderError::InvalidHeaderValue` when the value is not visible ASCII.
pub fn header_str<'a>(
    headers: &'a HeaderMap,
    name: &HeaderName,
) -> Result<Option<&'a str>, HeaderError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|e| HeaderError::InvalidHeaderValue {
                    name: name.as_str().to_string(),
                    message: e.to_string(),
                })
        })
        .transpose()
}

/// Like [`header_str`] but logs and drops undecodable values.
#[must_use]
pub fn header_lossy<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    match header_str(headers, name) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(target: "htmlspeed::http", error = %e, "Ignoring header");
            None
        }
    }
}

/// The `Cache-Control` directives freshness depends on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub no_store: bool,
    pub no_cache: bool,
    pub private: bool,
    pub max_age: Option<u64>,
    pub s_maxage: Option<u64>,
}

impl CacheControl {
    /// Parse every `Cache-Control` header present.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let mut found = false;
        let mut cc = CacheControl::default();
        for value in headers.get_all(header::CACHE_CONTROL) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            found = true;
            for directive in value.split(',') {
                let (name, arg) = match directive.split_once('=') {
                    Some((name, arg)) => (name.trim(), Some(arg.trim().trim_matches('"'))),
                    None => (directive.trim(), None),
                };
                match name.to_ascii_lowercase().as_str() {
                    "no-store" => cc.no_store = true,
                    "no-cache" => cc.no_cache = true,
                    "private" => cc.private = true,
                    "max-age" => cc.max_age = arg.and_then(|a| a.parse().ok()),
                    "s-maxage" => cc.s_maxage = arg.and_then(|a| a.parse().ok()),
                    _ => {}
                }
            }
        }
        found.then_some(cc)
    }

    /// Response must not be stored or reused without revalidation
    #[must_use]
    pub fn forbids_caching(&self) -> bool {
        self.no_store || self.no_cache || self.private
    }
}

/// `Pragma: no-cache` (HTTP/1.0 legacy)
#[must_use]
pub fn has_pragma_no_cache(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::PRAGMA)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("no-cache"))
}

/// Per-user content: the response sets a cookie or is marked private.
#[must_use]
pub fn is_state_full(headers: &HeaderMap) -> bool {
    headers.contains_key(header::SET_COOKIE)
        || CacheControl::from_headers(headers).is_some_and(|cc| cc.private)
}

/// Request headers that stay with one connection or that the fetcher sets itself
const NOT_FORWARDED: [HeaderName; 15] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
    header::CONTENT_LENGTH,
    header::ACCEPT_ENCODING,
    header::IF_NONE_MATCH,
    header::IF_MODIFIED_SINCE,
    header::RANGE,
    header::IF_RANGE,
];

/// Copy the end-to-end headers of a browser request into `to`.
///
/// Hop-by-hop headers, those `Connection` names, and the ones the origin
/// fetch manages itself (encoding, validators, ranges) are left out.
pub fn forward_request_headers(from: &HeaderMap, to: &mut HeaderMap) {
    let listed: Vec<String> = from
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .collect();
    for (name, value) in from {
        if NOT_FORWARDED.contains(name) || listed.iter().any(|l| l == name.as_str()) {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}

/// Media type of `Content-Type` without parameters, lowercased.
#[must_use]
pub fn mime_type(headers: &HeaderMap) -> Option<String> {
    header_lossy(headers, &header::CONTENT_TYPE).map(|ct| {
        ct.split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    })
}

/// `charset=` parameter of a `Content-Type` value.
#[must_use]
pub fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn cache_control_directives() {
        let map = headers(&[
            (header::CACHE_CONTROL, "public, max-age=600"),
            (header::CACHE_CONTROL, "s-maxage=\"60\""),
        ]);
        let cc = CacheControl::from_headers(&map).expect("present");
        assert_eq!(cc.max_age, Some(600));
        assert_eq!(cc.s_maxage, Some(60));
        assert!(!cc.forbids_caching());
        assert!(CacheControl::from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn set_cookie_makes_state_full() {
        assert!(is_state_full(&headers(&[(header::SET_COOKIE, "sid=1")])));
        assert!(is_state_full(&headers(&[(header::CACHE_CONTROL, "Private")])));
        assert!(!is_state_full(&headers(&[(header::CACHE_CONTROL, "public")])));
    }

    #[test]
    fn only_end_to_end_headers_are_forwarded() {
        let browser = headers(&[
            (header::COOKIE, "sid=7"),
            (header::COOKIE, "theme=dark"),
            (header::AUTHORIZATION, "Basic YTpi"),
            (header::USER_AGENT, "Mozilla/5.0"),
            (header::CONNECTION, "keep-alive, X-Trace"),
            (HeaderName::from_static("x-trace"), "1"),
            (header::HOST, "proxy.example"),
            (header::ACCEPT_ENCODING, "br"),
            (header::IF_NONE_MATCH, "[XrY7u_Ae7tCTyyK7j1rNww0]"),
            (header::RANGE, "bytes=0-10"),
        ]);
        let mut forwarded = HeaderMap::new();
        forward_request_headers(&browser, &mut forwarded);

        let cookies: Vec<_> = forwarded
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(cookies, vec!["sid=7", "theme=dark"]);
        assert_eq!(header_lossy(&forwarded, &header::AUTHORIZATION), Some("Basic YTpi"));
        assert_eq!(header_lossy(&forwarded, &header::USER_AGENT), Some("Mozilla/5.0"));
        for dropped in ["connection", "x-trace", "host", "accept-encoding", "if-none-match", "range"] {
            assert!(!forwarded.contains_key(dropped), "{dropped} was forwarded");
        }
    }

    #[test]
    fn mime_and_charset() {
        let map = headers(&[(header::CONTENT_TYPE, "Text/HTML; charset=\"utf-8\"")]);
        assert_eq!(mime_type(&map).as_deref(), Some("text/html"));
        assert_eq!(charset_of("text/html; charset=\"utf-8\""), Some("utf-8"));
        assert_eq!(charset_of("text/html"), None);
    }

    #[test]
    fn non_ascii_values_are_reported() {
        let mut map = HeaderMap::new();
        map.insert(header::ETAG, HeaderValue::from_bytes(b"\"\xff\"").unwrap());
        assert!(header_str(&map, &header::ETAG).is_err());
        assert_eq!(header_lossy(&map, &header::ETAG), None);
        assert!(has_pragma_no_cache(&headers(&[(header::PRAGMA, "No-Cache")])));
    }
}
