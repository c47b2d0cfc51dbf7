//! Stylesheet rewriting
//!
//! Relative `url(...)` references break once a stylesheet is inlined into a
//! page at another path, so every one is made absolute. Background images
//! the caller can supply a data URI for are inlined in the same pass.

use bytes::Bytes;
use url::Url;

use crate::http::url::absolutize;
use crate::scanner::matcher::find_ci;
use crate::scanner::{RecordKind, ScanConfig, scan, url_value};

/// Rewrite `css` fetched from `base`.
///
/// `inline_image` is asked for a data URI for each background image URL;
/// returning `None` keeps the (absolutized) reference. Returns `None` when
/// nothing changed.
pub fn rewrite_css(
    css: &[u8],
    base: &Url,
    mut inline_image: impl FnMut(&Url) -> Option<Bytes>,
) -> Option<Vec<u8>> {
    let backgrounds: Vec<usize> = scan(css, ScanConfig::css())
        .records()
        .iter()
        .filter(|r| r.kind() == RecordKind::CssImage)
        .filter_map(|r| r.url_span().map(|s| s.first))
        .collect();

    let mut out = Vec::with_capacity(css.len() + css.len() / 8);
    let mut copied = 0;
    let mut changed = false;
    let mut inlined = 0usize;
    let mut pos = 0;
    while let Some(at) = find_ci(css, pos, b"url(") {
        let Some((span, end)) = url_value(css, at + 4, css.len()) else {
            break;
        };
        pos = end;
        let Ok(raw) = std::str::from_utf8(span.slice(css)) else {
            continue;
        };
        let Some(absolute) = absolutize(base, raw) else {
            continue;
        };
        let differs = raw != absolute.as_str();
        let replacement = if backgrounds.binary_search(&span.first).is_ok() {
            inline_image(&absolute)
        } else {
            None
        };
        if replacement.is_none() && !differs {
            continue;
        }
        changed = true;
        out.extend_from_slice(&css[copied..span.first]);
        match replacement {
            Some(uri) => {
                out.extend_from_slice(&uri);
                inlined += 1;
            }
            None => out.extend_from_slice(absolute.as_str().as_bytes()),
        }
        copied = span.last;
    }
    if !changed {
        return None;
    }
    out.extend_from_slice(&css[copied..]);
    tracing::trace!(
        target: "htmlspeed::resolver",
        base = %base,
        inlined,
        "Rewrote stylesheet references"
    );
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://a.com/css/site.css").unwrap()
    }

    fn rewrite(css: &str, inline: impl FnMut(&Url) -> Option<Bytes>) -> Option<String> {
        rewrite_css(css.as_bytes(), &base(), inline).map(|v| String::from_utf8(v).unwrap())
    }

    #[test]
    fn relative_references_become_absolute() {
        let out = rewrite(
            "@font-face{src:url(../f/a.woff)} p{background:url('i/p.png') no-repeat}",
            |_| None,
        )
        .unwrap();
        assert_eq!(
            out,
            "@font-face{src:url(http://a.com/f/a.woff)} p{background:url('http://a.com/css/i/p.png') no-repeat}"
        );
    }

    #[test]
    fn background_images_are_inlined_when_supplied() {
        let out = rewrite(
            "p{background-image:url(dot.gif)} @font-face{src:url(dot.gif)}",
            |url| (url.as_str() == "http://a.com/css/dot.gif").then(|| Bytes::from_static(b"data:image/gif;base64,R0")),
        )
        .unwrap();
        assert_eq!(
            out,
            "p{background-image:url(data:image/gif;base64,R0)} @font-face{src:url(http://a.com/css/dot.gif)}"
        );
    }

    #[test]
    fn untouched_stylesheets_yield_none() {
        assert!(rewrite("p{color:red} q{background:url(data:image/png;base64,AA)}", |_| None).is_none());
        assert!(rewrite("p{background:url(http://b.com/x.png)}", |_| None).is_none());
    }
}
