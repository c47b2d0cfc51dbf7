//! Resource construction
//!
//! Derived buffers (gzip copy, data URI, digest, version URL, ETag) are all
//! computed once in [`ResourceBuilder::build`].

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;

use super::{Encoded, Resource, ResourceFlags, ResourceKind, Validators};
use crate::http::url::{host_of, with_version};
use crate::http::compression::is_worthwhile;
use crate::http::{ContentEncoding, gzip_if_worthwhile};
use crate::variant::{Variant, digest_token, md5_digest, to_etag};

const DEFAULT_GZIP_LEVEL: u32 = 6;
const DEFAULT_INLINE_LIMIT: usize = 64 * 1024;

/// Builder for [`Resource`]
#[derive(Debug, Clone)]
pub struct ResourceBuilder {
    kind: ResourceKind,
    url: String,
    variant: Variant,
    original: Bytes,
    original_gzip: Option<Encoded>,
    optimized: Option<Bytes>,
    optimized_gzip: Option<Bytes>,
    content_type: Option<String>,
    base64_inline: Option<Bytes>,
    origin: Validators,
    max_age: u64,
    state_full: bool,
    in_ie_comment: bool,
    gzip_level: u32,
    version_urls: bool,
    inline_limit: usize,
}

impl ResourceBuilder {
    pub fn new(kind: ResourceKind, url: impl Into<String>, original: impl Into<Bytes>) -> Self {
        Self {
            kind,
            url: url.into(),
            variant: Variant::NON_PAGE,
            original: original.into(),
            original_gzip: None,
            optimized: None,
            optimized_gzip: None,
            content_type: None,
            base64_inline: None,
            origin: Validators::default(),
            max_age: 0,
            state_full: false,
            in_ie_comment: false,
            gzip_level: DEFAULT_GZIP_LEVEL,
            version_urls: false,
            inline_limit: DEFAULT_INLINE_LIMIT,
        }
    }

    /// Page variant; ignored for other kinds.
    #[must_use]
    pub fn variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    #[must_use]
    pub fn original_gzip(mut self, bytes: Bytes, encoding: ContentEncoding) -> Self {
        self.original_gzip = Some(Encoded { bytes, encoding });
        self
    }

    /// Rewritten body; defaults to the original.
    #[must_use]
    pub fn optimized(mut self, bytes: impl Into<Bytes>) -> Self {
        self.optimized = Some(bytes.into());
        self
    }

    /// Gzip of the optimized body produced alongside it; kept only when
    /// it saves enough to be worth serving.
    #[must_use]
    pub fn optimized_gzip(mut self, bytes: impl Into<Bytes>) -> Self {
        self.optimized_gzip = Some(bytes.into());
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Use `data_uri` as the inline form instead of encoding the image.
    #[must_use]
    pub fn base64_inline(mut self, data_uri: impl Into<Bytes>) -> Self {
        self.base64_inline = Some(data_uri.into());
        self
    }

    #[must_use]
    pub fn validators(mut self, origin: Validators) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn max_age(mut self, secs: u64) -> Self {
        self.max_age = secs;
        self
    }

    #[must_use]
    pub fn state_full(mut self, state_full: bool) -> Self {
        self.state_full = state_full;
        self
    }

    #[must_use]
    pub fn in_ie_comment(mut self, in_ie_comment: bool) -> Self {
        self.in_ie_comment = in_ie_comment;
        self
    }

    #[must_use]
    pub fn gzip_level(mut self, level: u32) -> Self {
        self.gzip_level = level;
        self
    }

    #[must_use]
    pub fn version_urls(mut self, enabled: bool) -> Self {
        self.version_urls = enabled;
        self
    }

    /// Largest inline form that still counts as inlinable
    #[must_use]
    pub fn inline_limit(mut self, limit: usize) -> Self {
        self.inline_limit = limit;
        self
    }

    #[must_use]
    pub fn build(self) -> Resource {
        let kind = self.kind;
        let optimized = self.optimized.unwrap_or_else(|| self.original.clone());
        let digest = digest_token(&md5_digest(&optimized));
        let content_type = self
            .content_type
            .unwrap_or_else(|| kind.default_mime(&self.url).to_string());

        let optimized_gzip = match self.optimized_gzip {
            Some(bytes) => is_worthwhile(optimized.len(), bytes.len()).then_some(bytes),
            None if kind.is_text() => {
                gzip_if_worthwhile(&optimized, self.gzip_level).map(Bytes::from)
            }
            None => None,
        }
        .map(|bytes| Encoded {
            bytes,
            encoding: ContentEncoding::Gzip,
        });

        let base64_inline = match kind {
            ResourceKind::Image => Some(
                self.base64_inline
                    .unwrap_or_else(|| data_uri(&content_type, &optimized)),
            ),
            _ => None,
        };

        let (variant, etag) = if kind == ResourceKind::Page {
            let etag = to_etag(
                self.origin.etag.as_deref(),
                &digest,
                self.variant,
                self.state_full,
            );
            (self.variant, Some(etag))
        } else {
            (Variant::NON_PAGE, self.origin.etag.clone())
        };

        let version_url = (self.version_urls && kind != ResourceKind::Page)
            .then(|| with_version(&self.url, &digest));

        let inline_size = match &base64_inline {
            Some(uri) => uri.len(),
            None => optimized.len(),
        };
        let flags = ResourceFlags {
            inlinable: kind.can_inline() && !self.state_full && inline_size <= self.inline_limit,
            optimized: optimized != self.original,
            in_ie_comment: self.in_ie_comment,
        };

        Resource {
            kind,
            host: host_of(&self.url).unwrap_or_default(),
            url: self.url,
            variant,
            original: self.original,
            original_gzip: self.original_gzip,
            optimized,
            optimized_gzip,
            content_type,
            base64_inline,
            version_url,
            origin: self.origin,
            etag,
            digest,
            max_age: self.max_age,
            state_full: self.state_full,
            flags,
        }
    }
}

/// `data:` URI embedding `bytes`
#[must_use]
pub fn data_uri(content_type: &str, bytes: &[u8]) -> Bytes {
    let mime = content_type.split(';').next().unwrap_or(content_type).trim();
    let payload = general_purpose::STANDARD.encode(bytes);
    let mut uri = String::with_capacity(mime.len() + payload.len() + 13);
    uri.push_str("data:");
    uri.push_str(mime);
    uri.push_str(";base64,");
    uri.push_str(&payload);
    Bytes::from(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{BrowserClass, is_html_speed_etag, parse_etag};

    #[test]
    fn images_carry_a_data_uri() {
        let image = ResourceBuilder::new(ResourceKind::Image, "http://a.com/i.png", vec![0u8, 0])
            .build();
        assert_eq!(image.base64_inline.as_deref(), Some(&b"data:image/png;base64,AAA="[..]));
        assert!(image.flags.inlinable);
        assert_eq!(image.host, "a.com");
        assert_eq!(image.variant, Variant::NON_PAGE);
        assert!(image.optimized_gzip.is_none());
    }

    #[test]
    fn oversized_or_state_full_resources_are_not_inlinable() {
        let big = ResourceBuilder::new(ResourceKind::Js, "http://a.com/a.js", vec![b'x'; 2048])
            .inline_limit(1024)
            .build();
        assert!(!big.flags.inlinable);
        let private = ResourceBuilder::new(ResourceKind::Js, "http://a.com/b.js", "x()")
            .state_full(true)
            .build();
        assert!(!private.flags.inlinable);
        let flash = ResourceBuilder::new(ResourceKind::Flash, "http://a.com/f.swf", "fws").build();
        assert!(!flash.flags.inlinable);
    }

    #[test]
    fn pages_get_html_speed_etags() {
        let variant = Variant::first_visit(BrowserClass::Mobile);
        let page = ResourceBuilder::new(ResourceKind::Page, "http://a.com/", "<html></html>")
            .variant(variant)
            .validators(Validators {
                etag: Some("\"v1\"".into()),
                ..Validators::default()
            })
            .build();
        let etag = page.etag.as_deref().unwrap();
        assert!(is_html_speed_etag(etag));
        let parsed = parse_etag(etag).unwrap();
        assert_eq!(parsed.origin, "\"v1\"");
        assert_eq!(parsed.variant, variant);
        assert_eq!(parsed.token, page.digest);
    }

    #[test]
    fn version_urls_embed_the_digest() {
        let css = ResourceBuilder::new(ResourceKind::Css, "http://a.com/s.css?x=1", "p{}")
            .version_urls(true)
            .build();
        let expected = format!("http://a.com/s.css?x=1&hsver={}", css.digest);
        assert_eq!(css.version_url.as_deref(), Some(expected.as_str()));
        assert_eq!(css.digest.len(), 22);
        assert!(!css.flags.optimized);
    }
}
