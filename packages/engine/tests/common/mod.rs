//! Shared fixtures: a scripted origin and an accelerator wired to it

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use htmlspeed_engine::prelude::*;
use http::header::{CACHE_CONTROL, CONTENT_TYPE, COOKIE, ETAG, IF_NONE_MATCH, SET_COOKIE};

pub const START: u64 = 1_700_000_000;

#[derive(Clone)]
struct Route {
    headers: HeaderMap,
    body: Bytes,
    /// Replaces `{cookie}` in the body with the request's Cookie header
    personal: bool,
}

/// Origin answering from a fixed table, counting requests per URL
#[derive(Default)]
pub struct MockOrigin {
    routes: Mutex<HashMap<String, Route>>,
    hits: Mutex<HashMap<String, usize>>,
    requests: Mutex<HashMap<String, Vec<HeaderMap>>>,
    delay: Option<Duration>,
    down: AtomicBool,
}

impl MockOrigin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every response takes `delay` to arrive.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn route(&self, url: &str, content_type: &str, max_age: u64, body: impl Into<Bytes>) {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).expect("content type"));
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_str(&format!("max-age={max_age}")).expect("cache control"),
        );
        self.route_with(url, headers, body);
    }

    pub fn route_with(&self, url: &str, headers: HeaderMap, body: impl Into<Bytes>) {
        self.routes.lock().expect("routes").insert(
            url.to_string(),
            Route {
                headers,
                body: body.into(),
                personal: false,
            },
        );
    }

    /// A state-full page greeting whoever the Cookie header names.
    pub fn personal_page(&self, url: &str) {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.insert(SET_COOKIE, HeaderValue::from_static("sid=42; Path=/"));
        self.routes.lock().expect("routes").insert(
            url.to_string(),
            Route {
                headers,
                body: Bytes::from_static(b"<html><body><p>hello {cookie}</p></body></html>"),
                personal: true,
            },
        );
    }

    /// A page that sets a session cookie.
    pub fn state_full_page(&self, url: &str, body: &str) {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.insert(SET_COOKIE, HeaderValue::from_static("sid=42; Path=/"));
        self.route_with(url, headers, body.to_string());
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().expect("hits").get(url).copied().unwrap_or(0)
    }

    /// Request headers of every fetch of `url`, oldest first.
    pub fn requests(&self, url: &str) -> Vec<HeaderMap> {
        self.requests.lock().expect("requests").get(url).cloned().unwrap_or_default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

impl OriginFetch for MockOrigin {
    fn fetch(&self, request: OriginRequest) -> BoxFuture<'_, std::result::Result<OriginResponse, FetchFailure>> {
        let url = request.url();
        *self.hits.lock().expect("hits").entry(url.clone()).or_insert(0) += 1;
        self.requests
            .lock()
            .expect("requests")
            .entry(url.clone())
            .or_default()
            .push(request.headers.clone());
        let route = self.routes.lock().expect("routes").get(&url).cloned();
        let down = self.down.load(Ordering::SeqCst);
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if down {
                return Err(FetchFailure::Connect("connection refused".into()));
            }
            let Some(route) = route else {
                return Ok(OriginResponse {
                    status: StatusCode::NOT_FOUND,
                    reason: None,
                    headers: HeaderMap::new(),
                    body: Bytes::new(),
                });
            };
            let etag = route.headers.get(ETAG);
            if etag.is_some() && etag == request.headers.get(IF_NONE_MATCH) {
                return Ok(OriginResponse {
                    status: StatusCode::NOT_MODIFIED,
                    reason: None,
                    headers: route.headers,
                    body: Bytes::new(),
                });
            }
            if route.personal {
                let cookie = request
                    .headers
                    .get(COOKIE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("stranger");
                let body = String::from_utf8_lossy(&route.body).replace("{cookie}", cookie);
                return Ok(OriginResponse::ok(route.headers, body));
            }
            Ok(OriginResponse::ok(route.headers, route.body))
        })
    }
}

pub fn accelerator(origin: Arc<MockOrigin>, domains: &[DomainSpec]) -> (Accelerator, Arc<ManualClock>) {
    accelerator_with(origin, AcceleratorConfig::default(), domains)
}

pub fn accelerator_with(
    origin: Arc<MockOrigin>,
    config: AcceleratorConfig,
    domains: &[DomainSpec],
) -> (Accelerator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let registry = Arc::new(Registry::new(config, domains).expect("valid configuration"));
    let mut collaborators = Collaborators::new(origin);
    collaborators.clock = clock.clone();
    let accelerator = Accelerator::new(registry, collaborators).expect("inside a runtime");
    (accelerator, clock)
}

pub const SITE_PAGE: &str = concat!(
    "<html><head><title>t</title>",
    "<link rel=\"stylesheet\" href=\"/site.css\">",
    "</head><body><p>hello</p>",
    "<img src=\"/dot.png\" alt=\"\">",
    "<script src=\"/app.js\"></script>",
    "</body></html>"
);

/// A small site: one stylesheet, one image and one script.
pub fn site(origin: &MockOrigin) {
    origin.route("http://a.example/", "text/html; charset=utf-8", 3600, SITE_PAGE);
    origin.route("http://a.example/site.css", "text/css", 3600, "p{color:red}");
    origin.route("http://a.example/dot.png", "image/png", 3600, &b"\x89PNG\r\n\x1a\nfake-pixels"[..]);
    origin.route("http://a.example/app.js", "application/javascript", 3600, "var answer=42;");
}

pub fn body_text(served: &Served) -> String {
    String::from_utf8_lossy(&served.body).into_owned()
}
