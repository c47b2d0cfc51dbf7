//! Page compilation
//!
//! Scan once, resolve once, then plan and assemble per inlining density. A
//! first-visit page that assembles larger than the oversized limit is
//! retried at the next visit's density until it fits or nothing is inlined;
//! the offset that worked is remembered per URL.

use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use url::Url;

use super::Accelerator;
use crate::assembler::{Assembled, Assembly, assemble};
use crate::config::{AcceleratorConfig, DomainConfig};
use crate::error::Result;
use crate::http::headers::header_lossy;
use crate::http::url::absolutize;
use crate::http::{ContentEncoding, is_state_full};
use crate::resolver::loader::validators_of;
use crate::resolver::{Page, Resolved};
use crate::resource::{Resource, ResourceBuilder, ResourceKind, max_age_of};
use crate::scanner::{Scan, ScanConfig, is_html, scan};
use crate::variant::{Variant, Visit};

/// Steps from `First` to `Fourth`
const MAX_OFFSET: u8 = 4;

impl Accelerator {
    /// Compile the page at `url` for `variant` from its origin body.
    pub(crate) async fn compile(
        &self,
        url: &Url,
        variant: Variant,
        raw: Bytes,
        headers: &HeaderMap,
        encoded: Option<(Bytes, ContentEncoding)>,
    ) -> Result<Resource> {
        let ctx = self.inner.resolver.context();
        let config = ctx.registry.config();
        let domain = ctx.registry.domain(url.host_str().unwrap_or_default());
        let state_full = is_state_full(headers);

        let mut builder = ResourceBuilder::new(ResourceKind::Page, url.as_str(), raw.clone())
            .variant(variant)
            .validators(validators_of(headers))
            .max_age(max_age_of(headers, ctx.clock.now(), domain.known_stateless, &config.freshness))
            .state_full(state_full)
            .gzip_level(config.gzip_level)
            .content_type(header_lossy(headers, &CONTENT_TYPE).unwrap_or("text/html"));
        if let Some((bytes, encoding)) = encoded {
            builder = builder.original_gzip(bytes, encoding);
        }
        if !is_html(&raw) {
            tracing::debug!(target: "htmlspeed::accelerator", url = %url, "Not markup, serving as fetched");
            return Ok(builder.build());
        }

        let scan_config = if domain.content_first {
            ScanConfig::content_first()
        } else {
            ScanConfig::html()
        };
        let scanned = scan(&raw, scan_config);
        let base = scanned
            .base_href(&raw)
            .and_then(|href| absolutize(url, &String::from_utf8_lossy(href)))
            .unwrap_or_else(|| url.clone());

        let start = self.start_offset(url.as_str(), variant);
        let page = Page {
            doc: &raw,
            scan: &scanned,
            base: &base,
            variant: variant.shifted(start),
            state_full,
            domain: &domain,
        };
        let resolved = self.inner.resolver.resolve(&page).await;

        let assembled = self.assemble_within_budget(
            url,
            variant,
            start,
            &Compilation {
                doc: &raw,
                scan: &scanned,
                base: &base,
                resolved: &resolved,
                domain: &domain,
                config: &config,
            },
        )?;
        let mut builder = builder.optimized(assembled.body);
        if let Some(gzip) = assembled.gzip {
            builder = builder.optimized_gzip(gzip);
        }
        Ok(builder.build())
    }

    fn start_offset(&self, url: &str, variant: Variant) -> u8 {
        if variant.visit() != Some(Visit::First) {
            return 0;
        }
        self.inner.downgrades.get(url).map_or(0, |offset| *offset)
    }

    fn assemble_within_budget(
        &self,
        url: &Url,
        variant: Variant,
        start: u8,
        page: &Compilation<'_>,
    ) -> Result<Assembled> {
        let first_visit = variant.visit() == Some(Visit::First);
        let https = url.scheme() == "https";
        let mut offset = start;
        loop {
            let effective = variant.shifted(offset);
            let decisions = self
                .inner
                .resolver
                .plan(page.resolved, effective, https, page.domain);
            let assembled = assemble(&Assembly {
                doc: page.doc,
                scan: page.scan,
                base: page.base,
                refs: &page.resolved.refs,
                decisions: &decisions,
                domain: page.domain,
                gzip_level: Some(page.config.gzip_level),
            })?;

            let fits = assembled.uncompressed_len() <= page.config.oversized_page_limit;
            let exhausted = offset >= MAX_OFFSET || effective.visit() == Some(Visit::Fourth);
            if !first_visit || fits || exhausted {
                if first_visit && offset != start {
                    self.inner.downgrades.insert(url.as_str().to_string(), offset);
                    tracing::debug!(
                        target: "htmlspeed::accelerator",
                        url = %url,
                        offset,
                        size = assembled.uncompressed_len(),
                        "Downgraded oversized page"
                    );
                }
                return Ok(assembled);
            }
            offset += 1;
        }
    }

    /// Visit offset remembered for an oversized page
    #[must_use]
    pub fn downgrade_offset(&self, url: &str) -> Option<u8> {
        self.inner.downgrades.get(url).map(|offset| *offset)
    }
}

/// Per-page inputs shared by every assembly attempt
struct Compilation<'a> {
    doc: &'a [u8],
    scan: &'a Scan,
    base: &'a Url,
    resolved: &'a Resolved,
    domain: &'a DomainConfig,
    config: &'a AcceleratorConfig,
}
