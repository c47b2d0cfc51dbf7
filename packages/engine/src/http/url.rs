//! URL normalization for references found in documents

use url::Url;

/// Query parameter carrying a content digest on version URLs
pub const VERSION_PARAM: &str = "hsver";

/// Strip a leading `http://` or `https://` (ASCII case-insensitive).
#[must_use]
pub fn strip_scheme(url: &str) -> &str {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = url
            .get(..scheme.len())
            .filter(|head| head.eq_ignore_ascii_case(scheme))
            .and_then(|_| url.get(scheme.len()..))
        {
            return rest;
        }
    }
    url
}

/// Lowercased host of an absolute URL.
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_ascii_lowercase)
}

/// Resolve a raw attribute value against the document's base.
///
/// Spaces and Hebrew characters are percent-encoded first, `&amp;` entities
/// are decoded and dot segments collapse. Returns `None` for values that are
/// not fetchable (`data:`, `about:blank`, `javascript:`, fragments) or that
/// fail to resolve.
#[must_use]
pub fn absolutize(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains('#') {
        return None;
    }
    let lower = raw.get(..11).unwrap_or(raw).to_ascii_lowercase();
    if lower.starts_with("data:") || lower.starts_with("about:") || lower.starts_with("javascript:") {
        return None;
    }
    let encoded = encode_reference(&raw.replace("&amp;", "&"));
    let resolved = base.join(&encoded).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

fn encode_reference(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            ' ' => out.push_str("%20"),
            '\u{0590}'..='\u{05ff}' => {
                let mut buf = [0u8; 4];
                for b in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{b:02X}"));
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Append the version digest parameter.
#[must_use]
pub fn with_version(url: &str, token: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{VERSION_PARAM}={token}")
}

/// Split a version URL into the underlying URL and its digest token.
#[must_use]
pub fn strip_version(url: &str) -> Option<(String, &str)> {
    let (path, query) = url.split_once('?')?;
    let mut token = None;
    let rest: Vec<&str> = query
        .split('&')
        .filter(|pair| match pair.split_once('=') {
            Some((VERSION_PARAM, value)) => {
                token = Some(value);
                false
            }
            _ => true,
        })
        .collect();
    let token = token?;
    let base = if rest.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", rest.join("&"))
    };
    Some((base, token))
}

/// Path plus query of an absolute URL, as sent to the origin.
#[must_use]
pub fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{q}", url.path()),
        None => url.path().to_string(),
    }
}
