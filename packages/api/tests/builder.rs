use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use htmlspeed::header::{CACHE_CONTROL, CONTENT_TYPE};
use htmlspeed::{DomainBuilder, HtmlSpeed};
use htmlspeed::{
    FetchFailure, HeaderMap, HeaderValue, ManualClock, OriginFetch, OriginRequest, OriginResponse,
    ServedFrom, StatusCode,
};

/// Serves the same small page for every URL.
#[derive(Default)]
struct StaticOrigin {
    fetches: AtomicUsize,
}

impl OriginFetch for StaticOrigin {
    fn fetch(&self, _request: OriginRequest) -> BoxFuture<'_, Result<OriginResponse, FetchFailure>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=600"));
            Ok(OriginResponse::ok(
                headers,
                Bytes::from_static(b"<html><body><p>hi</p></body></html>"),
            ))
        })
    }
}

#[tokio::test]
async fn builds_and_serves() {
    let origin = Arc::new(StaticOrigin::default());
    let accelerator = HtmlSpeed::builder(origin.clone())
        .accelerate("www.example.com")
        .fetch_timeout(Duration::from_secs(2))
        .clock(Arc::new(ManualClock::new(1_700_000_000)))
        .build()
        .expect("valid configuration");

    let request = HtmlSpeed::request("http://www.example.com/").accept_gzip().build();
    let first = accelerator.serve(&request).await.expect("served");
    let second = accelerator.serve(&request).await.expect("served");

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.from, ServedFrom::Origin);
    assert_eq!(second.from, ServedFrom::Cache);
    assert_eq!(origin.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(accelerator.registry().hosts(), vec!["www.example.com".to_string()]);
}

#[tokio::test]
async fn later_domain_specs_replace_earlier_ones() {
    let accelerator = htmlspeed::builder(Arc::new(StaticOrigin::default()))
        .domain(DomainBuilder::new("a.example"))
        .domain(DomainBuilder::new("A.example").version_urls())
        .build()
        .expect("valid configuration");

    assert_eq!(accelerator.registry().hosts().len(), 1);
    assert!(accelerator.registry().domain("a.example").version_urls);
}

#[tokio::test]
async fn domains_load_from_json() {
    let accelerator = HtmlSpeed::builder(Arc::new(StaticOrigin::default()))
        .domains_json(r#"[{"host": "a.example", "content_first": true}, {"host": "b.example", "enabled": false}]"#)
        .build()
        .expect("valid configuration");

    let registry = accelerator.registry();
    assert!(registry.domain("a.example").content_first);
    assert!(!registry.domain("b.example").enabled);
}

#[tokio::test]
async fn invalid_settings_fail_the_build() {
    let origin: Arc<dyn OriginFetch> = Arc::new(StaticOrigin::default());

    let err = HtmlSpeed::builder(origin.clone())
        .gzip_level(12)
        .build()
        .expect_err("gzip level out of range");
    assert!(err.is_config());

    let err = HtmlSpeed::builder(origin.clone())
        .config_json("{ not json")
        .build()
        .expect_err("malformed json");
    assert!(err.is_config());

    let err = HtmlSpeed::builder(origin)
        .domain(DomainBuilder::new("a.example").no_inline("(unclosed"))
        .build()
        .expect_err("bad pattern");
    assert!(err.is_config());
}

#[test]
fn building_outside_a_runtime_fails() {
    let err = HtmlSpeed::builder(Arc::new(StaticOrigin::default()))
        .build()
        .expect_err("no runtime");
    assert!(!err.is_config());
}
