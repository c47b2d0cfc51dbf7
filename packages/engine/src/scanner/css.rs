//! `background` / `background-image` declarations inside CSS text

use super::matcher::{find_ci, is_ident, is_space, skip_space, starts_with_ci};
use super::record::Span;

/// Report the URL span of every `url(...)` in a background declaration
/// within `doc[from..to]`. Quotes and surrounding whitespace are excluded.
pub(crate) fn background_urls(doc: &[u8], from: usize, to: usize, mut found: impl FnMut(Span)) {
    let to = to.min(doc.len());
    let mut i = from;
    while i < to {
        let Some(at) = find_ci(&doc[..to], i, b"background") else {
            return;
        };
        let mut k = at + b"background".len();
        let standalone = at == from || !is_ident(doc[at - 1]);
        if standalone && starts_with_ci(doc, k, b"-image") {
            k += b"-image".len();
        }
        k = skip_space(&doc[..to], k);
        if standalone && k < to && doc[k] == b':' {
            i = declaration_urls(doc, k + 1, to, &mut found);
        } else {
            i = at + 1;
        }
    }
}

/// Walk one declaration value until `;` or `}`; returns where scanning resumes.
fn declaration_urls(doc: &[u8], mut i: usize, to: usize, found: &mut impl FnMut(Span)) -> usize {
    while i < to {
        match doc[i] {
            b';' | b'}' => return i + 1,
            b'u' | b'U' if starts_with_ci(doc, i, b"url(") => match url_value(doc, i + 4, to) {
                Some((span, end)) => {
                    if !span.is_empty() {
                        found(span);
                    }
                    i = end;
                }
                None => return to,
            },
            _ => i += 1,
        }
    }
    to
}

/// Parse the inside of `url(`; returns the value span and the offset past `)`.
pub(crate) fn url_value(doc: &[u8], open: usize, to: usize) -> Option<(Span, usize)> {
    let mut i = skip_space(&doc[..to], open);
    let quote = match doc.get(i) {
        Some(&q @ (b'"' | b'\'')) if i < to => {
            i += 1;
            Some(q)
        }
        _ => None,
    };
    let first = i;
    let last = match quote {
        Some(q) => {
            while i < to && doc[i] != q {
                i += 1;
            }
            let last = i;
            i += 1;
            last
        }
        None => {
            while i < to && doc[i] != b')' {
                i += 1;
            }
            let mut last = i;
            while last > first && is_space(doc[last - 1]) {
                last -= 1;
            }
            last
        }
    };
    while i < to && doc[i] != b')' {
        i += 1;
    }
    (i < to).then(|| (Span::new(first, last), i + 1))
}
