//! Cached resources
//!
//! A [`Resource`] is immutable once built and shared as `Arc<Resource>`.
//! Anything that changes over its cached lifetime (freshness, recency, the
//! being-loaded flag) lives in the cache's own bookkeeping, so a refresh
//! builds a new `Resource` and swaps the entry.

pub mod builder;
pub mod css;
pub mod freshness;

use std::fmt;

use bytes::Bytes;

use crate::http::ContentEncoding;
use crate::variant::Variant;

pub use builder::ResourceBuilder;
pub use css::rewrite_css;
pub use freshness::max_age_of;

/// Closed set of resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Page,
    Css,
    Js,
    Image,
    Flash,
}

impl ResourceKind {
    /// Classify by media type, falling back to the URL's extension.
    #[must_use]
    pub fn detect(mime: Option<&str>, url: &str) -> Option<Self> {
        mime.and_then(Self::from_mime)
            .or_else(|| Self::from_extension(url))
    }

    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("text/html") || mime.starts_with("application/xhtml") {
            Some(ResourceKind::Page)
        } else if mime == "text/css" {
            Some(ResourceKind::Css)
        } else if mime.contains("javascript") || mime.contains("ecmascript") {
            Some(ResourceKind::Js)
        } else if mime.starts_with("image/") {
            Some(ResourceKind::Image)
        } else if mime == "application/x-shockwave-flash" {
            Some(ResourceKind::Flash)
        } else {
            None
        }
    }

    #[must_use]
    pub fn from_extension(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" | "xhtml" => Some(ResourceKind::Page),
            "css" => Some(ResourceKind::Css),
            "js" => Some(ResourceKind::Js),
            "png" | "gif" | "jpg" | "jpeg" | "ico" | "bmp" | "webp" | "svg" => {
                Some(ResourceKind::Image)
            }
            "swf" => Some(ResourceKind::Flash),
            _ => None,
        }
    }

    /// Text kinds get a gzip copy
    #[must_use]
    pub fn is_text(self) -> bool {
        matches!(self, ResourceKind::Page | ResourceKind::Css | ResourceKind::Js)
    }

    /// Kinds the assembler knows how to inline
    #[must_use]
    pub fn can_inline(self) -> bool {
        matches!(self, ResourceKind::Css | ResourceKind::Js | ResourceKind::Image)
    }

    /// Media type used when the origin sent none
    #[must_use]
    pub fn default_mime(self, url: &str) -> &'static str {
        match self {
            ResourceKind::Page => "text/html",
            ResourceKind::Css => "text/css",
            ResourceKind::Js => "application/javascript",
            ResourceKind::Flash => "application/x-shockwave-flash",
            ResourceKind::Image => image_mime(url),
        }
    }
}

fn image_mime(url: &str) -> &'static str {
    let path = url.split('?').next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".ico") {
        "image/x-icon"
    } else if path.ends_with(".svg") {
        "image/svg+xml"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        "image/png"
    }
}

/// A body together with the `Content-Encoding` it is stored in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Bytes,
    pub encoding: ContentEncoding,
}

/// Kind-specific flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceFlags {
    /// Small enough and of a kind that may be inlined
    pub inlinable: bool,
    /// Optimized bytes differ from the original
    pub optimized: bool,
    /// First referenced from inside an IE conditional comment
    pub in_ie_comment: bool,
}

/// Origin validators kept for conditional refreshes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_md5: Option<String>,
}

/// One fetched artifact
#[derive(Clone, PartialEq, Eq)]
pub struct Resource {
    pub kind: ResourceKind,
    pub host: String,
    pub url: String,
    pub variant: Variant,

    pub original: Bytes,
    /// The origin's compressed body, when it sent one
    pub original_gzip: Option<Encoded>,
    pub optimized: Bytes,
    pub optimized_gzip: Option<Encoded>,

    /// Media type, parameters included
    pub content_type: String,
    /// `data:<mime>;base64,<payload>`, images only
    pub base64_inline: Option<Bytes>,
    /// URL carrying the content digest, for far-future caching
    pub version_url: Option<String>,

    pub origin: Validators,
    /// ETag sent to browsers
    pub etag: Option<String>,
    /// 22-char digest of the optimized bytes
    pub digest: String,

    /// Freshness lifetime granted at build time
    pub max_age: u64,
    pub state_full: bool,
    pub flags: ResourceFlags,
}

impl Resource {
    /// Bytes held by all content buffers
    #[must_use]
    pub fn size(&self) -> u64 {
        let encoded = |e: &Option<Encoded>| e.as_ref().map_or(0, |e| e.bytes.len());
        (self.original.len()
            + encoded(&self.original_gzip)
            + self.optimized.len()
            + encoded(&self.optimized_gzip)) as u64
    }

    /// Bytes an inlined copy adds to a page
    #[must_use]
    pub fn inline_size(&self) -> usize {
        match (&self.kind, &self.base64_inline) {
            (ResourceKind::Image, Some(uri)) => uri.len(),
            _ => self.optimized.len(),
        }
    }

    /// Body to send, gzip-encoded when the client accepts it and a copy exists.
    #[must_use]
    pub fn body(&self, accept_gzip: bool) -> (Bytes, ContentEncoding) {
        match &self.optimized_gzip {
            Some(encoded) if accept_gzip => (encoded.bytes.clone(), encoded.encoding),
            _ => (self.optimized.clone(), ContentEncoding::Identity),
        }
    }

    #[must_use]
    pub fn is_page(&self) -> bool {
        self.kind == ResourceKind::Page
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("variant", &self.variant)
            .field("size", &self.size())
            .field("max_age", &self.max_age)
            .field("state_full", &self.state_full)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
