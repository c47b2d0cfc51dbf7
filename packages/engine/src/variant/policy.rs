//! Variant selection for an incoming request

use super::{BrowserClass, Variant, Visit, parse_etag};

/// Cookie marking a browser that has visited before
pub const VISIT_COOKIE: &str = "hsvisit";

/// Query parameter forcing a variant (diagnostics)
pub const VARIANT_PARAM: &str = "hsvariant";

/// Compute the variant a browser currently holds.
///
/// An explicit `hsvariant=` query parameter wins, then the variant encoded in
/// an HtmlSpeed ETag; otherwise the first visit of the user agent's class, or
/// first-plus when the visit cookie is present.
#[must_use]
pub fn variant_of(
    url: &str,
    etag: Option<&str>,
    cookie: Option<&str>,
    user_agent: Option<&str>,
) -> Variant {
    if let Some(forced) = forced_variant(url) {
        return forced;
    }

    if let Some(parsed) = etag.and_then(parse_etag)
        && parsed.variant.is_page()
    {
        return parsed.variant;
    }

    let browser = BrowserClass::from_user_agent(user_agent);
    if cookie.is_some_and(has_visit_cookie) {
        Variant::new(browser, Visit::FirstPlus)
    } else {
        Variant::first_visit(browser)
    }
}

fn forced_variant(url: &str) -> Option<Variant> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == VARIANT_PARAM)
        .and_then(|(_, value)| value.chars().next())
        .and_then(Variant::from_char)
        .filter(|v| v.is_page())
}

fn has_visit_cookie(cookie: &str) -> bool {
    cookie
        .split(';')
        .map(|pair| pair.split_once('=').map_or(pair, |(name, _)| name))
        .any(|name| name.trim() == VISIT_COOKIE)
}
