//! Origin fetches and resource construction
//!
//! Every fetch is bounded by the configured timeout and reported to the
//! health tracker. Communication failures (connect errors, timeouts) count
//! against the host; HTTP error statuses do not.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{
    ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, ETAG, HeaderMap, HeaderValue,
    IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use http::{HeaderName, StatusCode};
use url::Url;

use super::Context;
use crate::cache::LoadTicket;
use crate::error::{self, Result};
use crate::http::headers::header_lossy;
use crate::http::url::path_and_query;
use crate::http::{ContentEncoding, decompress, forward_request_headers, is_state_full, mime_type};
use crate::origin::OriginRequest;
use crate::resource::{Resource, ResourceBuilder, ResourceKind, Validators, max_age_of, rewrite_css};
use crate::variant::Variant;

const CONTENT_MD5: HeaderName = HeaderName::from_static("content-md5");

/// A successful origin exchange
#[derive(Debug, Clone)]
pub enum Fetched {
    /// New content, already decoded
    Body {
        headers: HeaderMap,
        body: Bytes,
        /// The body as it came over the wire when it was compressed
        encoded: Option<(Bytes, ContentEncoding)>,
    },
    /// `304`: the cached copy is still current
    NotModified { headers: HeaderMap },
}

/// Fetches resources from origin and builds them
#[derive(Clone)]
pub struct Loader {
    ctx: Context,
}

impl Loader {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// GET `url`, conditional on `validators` when refreshing.
    ///
    /// # Errors
    ///
    /// Timeout, communication failure, a non-success status, or a body that
    /// fails to decode.
    pub async fn fetch(&self, url: &Url, validators: Option<&Validators>) -> Result<Fetched> {
        self.fetch_for(url, validators, &HeaderMap::new()).await
    }

    /// [`fetch`](Self::fetch) on behalf of one browser, carrying its
    /// end-to-end request headers (cookies, credentials) to origin.
    ///
    /// # Errors
    ///
    /// As [`fetch`](Self::fetch).
    pub async fn fetch_for(
        &self,
        url: &Url,
        validators: Option<&Validators>,
        browser: &HeaderMap,
    ) -> Result<Fetched> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let domain = self.ctx.registry.domain(&host);
        let authority = match &domain.origin_authority {
            Some(authority) => authority.clone(),
            None => match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.clone(),
            },
        };

        let mut request = OriginRequest::get(url.scheme(), &authority, &path_and_query(url));
        forward_request_headers(browser, &mut request.headers);
        request
            .headers
            .insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
        if let Some(validators) = validators {
            if let Some(value) = validators
                .etag
                .as_deref()
                .and_then(|v| HeaderValue::from_str(v).ok())
            {
                request.headers.insert(IF_NONE_MATCH, value);
            }
            if let Some(value) = validators
                .last_modified
                .as_deref()
                .and_then(|v| HeaderValue::from_str(v).ok())
            {
                request.headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        let timeout = self.ctx.registry.config().timeouts.fetch_timeout();
        let response = match tokio::time::timeout(timeout, self.ctx.origin.fetch(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(failure)) => {
                self.ctx.health.report_failure(&host);
                tracing::warn!(target: "htmlspeed::loader", url = %url, error = %failure, "Origin fetch failed");
                return Err(error::Error::from(failure).with_url(url.as_str()));
            }
            Err(elapsed) => {
                self.ctx.health.report_failure(&host);
                tracing::warn!(
                    target: "htmlspeed::loader",
                    url = %url,
                    timeout_ms = timeout.as_millis() as u64,
                    "Origin fetch timed out"
                );
                return Err(error::timeout(elapsed).with_url(url.as_str()));
            }
        };
        self.ctx.health.report_success(&host);

        if response.status == StatusCode::NOT_MODIFIED {
            return Ok(Fetched::NotModified {
                headers: response.headers,
            });
        }
        if !response.status.is_success() {
            return Err(error::status(url.as_str(), response.status));
        }

        let encoding = header_lossy(&response.headers, &CONTENT_ENCODING)
            .and_then(ContentEncoding::from_header)
            .unwrap_or(ContentEncoding::Identity);
        let (body, encoded) = match encoding {
            ContentEncoding::Identity => (response.body, None),
            encoding => {
                let decoded = decompress(&response.body, encoding)
                    .map_err(|e| error::decode(e).with_url(url.as_str()))?;
                (Bytes::from(decoded), Some((response.body, encoding)))
            }
        };
        tracing::trace!(target: "htmlspeed::loader", url = %url, size = body.len(), "Fetched");
        Ok(Fetched::Body {
            headers: response.headers,
            body,
            encoded,
        })
    }

    /// Build the non-page resource for a fetched body.
    ///
    /// `expected` is used when neither the content type nor the extension
    /// names a kind. Images go through the optimizer, stylesheets get their
    /// references absolutized and tiny cached background images inlined.
    pub fn build(
        &self,
        url: &Url,
        headers: &HeaderMap,
        body: Bytes,
        encoded: Option<(Bytes, ContentEncoding)>,
        expected: ResourceKind,
    ) -> Resource {
        let config = self.ctx.registry.config();
        let domain = self.ctx.registry.domain(url.host_str().unwrap_or_default());
        let mime = mime_type(headers);
        let kind = ResourceKind::detect(mime.as_deref(), url.as_str()).unwrap_or(expected);
        let now = self.ctx.clock.now();

        let optimized = match kind {
            ResourceKind::Image if is_jpeg(mime.as_deref(), url) => {
                self.ctx.images.optimize(&body, config.image_quality)
            }
            ResourceKind::Css => {
                let tiny = config.inline.tiny;
                rewrite_css(&body, url, |image| {
                    self.ctx
                        .cache
                        .get_fresh(Variant::NON_PAGE, image.as_str())
                        .filter(|r| r.kind == ResourceKind::Image && r.inline_size() <= tiny)
                        .and_then(|r| r.base64_inline.clone())
                })
                .map(Bytes::from)
            }
            _ => None,
        };

        let mut builder = ResourceBuilder::new(kind, url.as_str(), body)
            .validators(validators_of(headers))
            .max_age(max_age_of(headers, now, domain.known_stateless, &config.freshness))
            .state_full(is_state_full(headers))
            .gzip_level(config.gzip_level)
            .version_urls(domain.version_urls)
            .inline_limit(config.inline.huge);
        if let Some(content_type) = header_lossy(headers, &CONTENT_TYPE) {
            builder = builder.content_type(content_type);
        }
        if let Some(optimized) = optimized {
            builder = builder.optimized(optimized);
        }
        if let Some((bytes, encoding)) = encoded {
            builder = builder.original_gzip(bytes, encoding);
        }
        builder.build()
    }

    /// Carry out a sub-resource load claimed from the cache.
    ///
    /// Always settles `ticket`. Returns the resource waiters were handed, or
    /// the refresh's previous resource when the load failed.
    pub async fn load(&self, ticket: LoadTicket, expected: ResourceKind) -> Option<Arc<Resource>> {
        let url = match Url::parse(ticket.url()) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(target: "htmlspeed::loader", url = ticket.url(), error = %e, "Unloadable URL");
                ticket.fail(false);
                return None;
            }
        };
        let validators = ticket.replacer().map(|r| r.origin.clone());

        match self.fetch(&url, validators.as_ref()).await {
            Ok(Fetched::NotModified { headers }) => {
                let config = self.ctx.registry.config();
                let domain = self.ctx.registry.domain(url.host_str().unwrap_or_default());
                let max_age =
                    max_age_of(&headers, self.ctx.clock.now(), domain.known_stateless, &config.freshness);
                let current = ticket.replacer().cloned();
                ticket.revalidated(max_age);
                current
            }
            Ok(Fetched::Body {
                headers,
                body,
                encoded,
            }) => {
                let resource = Arc::new(self.build(&url, &headers, body, encoded, expected));
                let store = !resource.state_full;
                ticket.complete(resource.clone(), store);
                Some(resource)
            }
            Err(e) => {
                let fallback = ticket.replacer().cloned();
                ticket.fail(e.is_fetch() || e.is_timeout());
                fallback
            }
        }
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader").finish_non_exhaustive()
    }
}

/// Origin validators to revalidate with later
pub(crate) fn validators_of(headers: &HeaderMap) -> Validators {
    let owned = |name: &HeaderName| header_lossy(headers, name).map(str::to_string);
    Validators {
        etag: owned(&ETAG),
        last_modified: owned(&LAST_MODIFIED),
        content_md5: owned(&CONTENT_MD5),
    }
}

fn is_jpeg(mime: Option<&str>, url: &Url) -> bool {
    match mime {
        Some(mime) => matches!(mime, "image/jpeg" | "image/jpg" | "image/pjpeg"),
        None => {
            let path = url.path().to_ascii_lowercase();
            path.ends_with(".jpg") || path.ends_with(".jpeg")
        }
    }
}
