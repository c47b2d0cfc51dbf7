//! Cache key generation
//!
//! A key is the variant character followed by the URL without its scheme:
//! the same bytes are served over http and https, so the scheme never
//! partitions the cache.

use std::fmt;

use crate::http::url::strip_scheme;
use crate::variant::Variant;

/// `<variant><url-without-scheme>`
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(variant: Variant, url: &str) -> Self {
        let rest = strip_scheme(url);
        let mut key = String::with_capacity(rest.len() + 1);
        key.push(variant.as_char());
        key.push_str(rest);
        CacheKey(key)
    }

    /// Key a resource of the given kind is stored under: pages keep their
    /// variant, everything else shares the non-page slot.
    pub fn canonical(is_page: bool, variant: Variant, url: &str) -> Self {
        if is_page {
            Self::new(variant, url)
        } else {
            Self::new(Variant::NON_PAGE, url)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn variant(&self) -> Option<Variant> {
        self.0.bytes().next().and_then(Variant::from_byte)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({:?})", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shorthand for [`CacheKey::new`]
pub fn to_key(variant: Variant, url: &str) -> CacheKey {
    CacheKey::new(variant, url)
}
