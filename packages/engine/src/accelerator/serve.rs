//! Serving one browser request

use std::sync::Arc;

use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderValue, StatusCode};
use url::Url;

use super::request::{PageRequest, Resolution, Served, ServedFrom};
use super::Accelerator;
use crate::cache::{LoadState, LoadTicket, Lookup};
use crate::error::{self, Result};
use crate::http::url::strip_version;
use crate::resolver::Fetched;
use crate::resource::{Resource, max_age_of};
use crate::variant::{Variant, is_html_speed_etag, variant_of};

impl Accelerator {
    /// Answer `request`.
    ///
    /// Browsers presenting an HtmlSpeed ETag move on to the next visit's
    /// variant. Misses are fetched under single-flight with the browser's
    /// own request headers; a failed fetch falls back to the previous cached
    /// copy when there is one. State-full pages are never shared: requests
    /// that waited on one fetch their own copy.
    ///
    /// # Errors
    ///
    /// The origin failed and nothing cached can stand in;
    /// [`status_hint`](crate::Error::status_hint) gives the status to answer with.
    pub async fn serve(&self, request: &PageRequest) -> Result<Served> {
        let url = Url::parse(&request.url).map_err(|e| error::decode(e).with_url(request.url.as_str()))?;
        let domain = self.registry().domain(url.host_str().unwrap_or_default());
        if !domain.enabled {
            return self.bypass(&url, request).await;
        }

        if strip_version(url.as_str()).is_some() {
            if let Resolution::Hit(resource) = self.resolve(url.as_str(), Variant::NON_PAGE, None) {
                let max_age = self.registry().config().freshness.version_max_age;
                return Ok(Served::versioned(resource, request, max_age));
            }
        }

        let etag = request.if_none_match();
        let presented = variant_of(url.as_str(), etag, request.cookie(), request.user_agent());
        let variant = if etag.is_some_and(is_html_speed_etag) {
            presented.next_visit()
        } else {
            presented
        };

        let cache = self.cache();
        match cache.acquire(variant, url.as_str(), true) {
            Lookup::Fresh(resource) => Ok(respond(resource, request, variant, etag, ServedFrom::Cache)),
            Lookup::Wait(waiter) => match waiter.wait().await {
                LoadState::Ready(resource) => Ok(respond(resource, request, variant, etag, ServedFrom::Origin)),
                LoadState::Private => {
                    let loaded = self.load_private(&url, request, variant).await?;
                    Ok(loaded.respond(request, variant, etag))
                }
                LoadState::Failed {
                    fallback: Some(resource),
                    ..
                } => Ok(respond(resource, request, variant, etag, ServedFrom::Fallback)),
                LoadState::Failed {
                    communication_failed,
                    fallback: None,
                } => Err(shared_load_failed(&url, communication_failed)),
                LoadState::Pending => Err(shared_load_failed(&url, false)),
            },
            Lookup::Load(ticket) => {
                if let Some(current) = ticket.fresh_replacer() {
                    let this = self.clone();
                    let refresh_url = url.clone();
                    let browser = request.headers.clone();
                    tokio::spawn(async move {
                        if let Err(e) = this.load(&refresh_url, &browser, ticket).await {
                            tracing::debug!(target: "htmlspeed::accelerator", url = %refresh_url, error = %e, "Background refresh failed");
                        }
                    });
                    return Ok(respond(current, request, variant, etag, ServedFrom::Cache));
                }
                let loaded = self.load(&url, &request.headers, ticket).await?;
                Ok(loaded.respond(request, variant, etag))
            }
        }
    }

    /// Fetch, build and publish the resource `ticket` claims.
    async fn load(&self, url: &Url, browser: &HeaderMap, ticket: LoadTicket) -> Result<Loaded> {
        let loader = self.inner.resolver.loader();
        let validators = ticket.replacer().map(|r| r.origin.clone());
        match loader.fetch_for(url, validators.as_ref(), browser).await {
            Ok(Fetched::Body {
                headers,
                body,
                encoded,
            }) => match self.build(url, ticket.variant(), body, &headers, encoded).await {
                Ok(resource) => {
                    let resource = Arc::new(resource);
                    let store = !resource.state_full;
                    ticket.complete(resource.clone(), store);
                    Ok(Loaded::fetched(resource, &headers))
                }
                Err(e) => {
                    ticket.fail(false);
                    Err(e)
                }
            },
            Ok(Fetched::NotModified { headers }) => match ticket.replacer().cloned() {
                Some(current) => {
                    let config = self.registry().config();
                    let domain = self.registry().domain(url.host_str().unwrap_or_default());
                    let now = self.inner.resolver.context().clock.now();
                    ticket.revalidated(max_age_of(&headers, now, domain.known_stateless, &config.freshness));
                    Ok(Loaded::kept(current, ServedFrom::Cache))
                }
                None => {
                    ticket.fail(false);
                    Err(error::status(url.as_str(), StatusCode::NOT_MODIFIED))
                }
            },
            Err(e) => {
                let fallback = ticket.replacer().cloned();
                ticket.fail(e.is_fetch() || e.is_timeout());
                match fallback {
                    Some(resource) => {
                        tracing::warn!(target: "htmlspeed::accelerator", url = %url, error = %e, "Serving cached fallback");
                        Ok(Loaded::kept(resource, ServedFrom::Fallback))
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Fetch and build a page for this browser alone, outside the cache.
    async fn load_private(&self, url: &Url, request: &PageRequest, variant: Variant) -> Result<Loaded> {
        tracing::debug!(target: "htmlspeed::accelerator", url = %url, "Shared load was state-full, fetching privately");
        let loader = self.inner.resolver.loader();
        match loader.fetch_for(url, None, &request.headers).await? {
            Fetched::Body {
                headers,
                body,
                encoded,
            } => {
                let resource = Arc::new(self.build(url, variant, body, &headers, encoded).await?);
                Ok(Loaded::fetched(resource, &headers))
            }
            Fetched::NotModified { .. } => Err(error::status(url.as_str(), StatusCode::NOT_MODIFIED)),
        }
    }

    /// Relay the origin response for a disabled domain.
    async fn bypass(&self, url: &Url, request: &PageRequest) -> Result<Served> {
        let loader = self.inner.resolver.loader();
        match loader.fetch_for(url, None, &request.headers).await? {
            Fetched::Body {
                mut headers,
                body,
                encoded,
            } => {
                let body = match encoded {
                    Some((bytes, _)) => bytes,
                    None => body,
                };
                headers.remove(http::header::CONTENT_LENGTH);
                Ok(Served {
                    status: StatusCode::OK,
                    headers,
                    body,
                    variant: Variant::NON_PAGE,
                    from: ServedFrom::Bypass,
                    resource: None,
                })
            }
            Fetched::NotModified { headers } => Ok(Served {
                status: StatusCode::NOT_MODIFIED,
                headers,
                body: bytes::Bytes::new(),
                variant: Variant::NON_PAGE,
                from: ServedFrom::Bypass,
                resource: None,
            }),
        }
    }
}

/// A resource ready to answer the browser that loaded it
struct Loaded {
    resource: Arc<Resource>,
    from: ServedFrom,
    /// Origin cookies meant for this browser only
    cookies: Vec<HeaderValue>,
}

impl Loaded {
    fn fetched(resource: Arc<Resource>, origin: &HeaderMap) -> Self {
        let cookies = if resource.state_full {
            origin.get_all(SET_COOKIE).iter().cloned().collect()
        } else {
            Vec::new()
        };
        Self {
            resource,
            from: ServedFrom::Origin,
            cookies,
        }
    }

    fn kept(resource: Arc<Resource>, from: ServedFrom) -> Self {
        Self {
            resource,
            from,
            cookies: Vec::new(),
        }
    }

    fn respond(self, request: &PageRequest, variant: Variant, etag: Option<&str>) -> Served {
        respond(self.resource, request, variant, etag, self.from).with_cookies(self.cookies)
    }
}

/// `304` when the browser already holds exactly this page variant.
fn respond(
    resource: Arc<Resource>,
    request: &PageRequest,
    variant: Variant,
    etag: Option<&str>,
    from: ServedFrom,
) -> Served {
    if etag.is_some() && resource.etag.as_deref() == etag {
        return Served::not_modified(resource, variant);
    }
    Served::resource(resource, request, variant, from)
}

fn shared_load_failed(url: &Url, communication_failed: bool) -> error::Error {
    let e = if communication_failed {
        error::fetch("origin unreachable")
    } else {
        error::fetch("shared load failed")
    };
    e.with_url(url.as_str())
}
