//! Byte-level matching helpers
//!
//! Tag and attribute names are matched ASCII case-insensitively against
//! lowercase patterns, optionally after skipping whitespace.

use memchr::memchr;

#[inline]
pub(crate) fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

/// Attribute value separators used by the quote heuristic
#[inline]
pub(crate) fn is_separator(b: u8) -> bool {
    is_space(b) || b == b'>' || b == b'/'
}

#[inline]
pub(crate) fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

/// `doc[at..]` starts with the lowercase `pattern`, ignoring ASCII case.
#[inline]
pub(crate) fn starts_with_ci(doc: &[u8], at: usize, pattern: &[u8]) -> bool {
    doc.get(at..at + pattern.len())
        .is_some_and(|window| window.eq_ignore_ascii_case(pattern))
}

pub(crate) fn skip_space(doc: &[u8], mut at: usize) -> usize {
    while at < doc.len() && is_space(doc[at]) {
        at += 1;
    }
    at
}

/// Skip whitespace then match `pattern`; returns the offset past the match.
pub(crate) fn match_ws(doc: &[u8], at: usize, pattern: &[u8]) -> Option<usize> {
    let at = skip_space(doc, at);
    starts_with_ci(doc, at, pattern).then_some(at + pattern.len())
}

/// First occurrence of the lowercase `pattern` at or after `from`, ignoring case.
pub(crate) fn find_ci(doc: &[u8], from: usize, pattern: &[u8]) -> Option<usize> {
    let (&head, _) = pattern.split_first()?;
    let upper = head.to_ascii_uppercase();
    let mut at = from;
    while at < doc.len() {
        let rest = &doc[at..];
        let hit = if upper == head {
            memchr(head, rest)
        } else {
            memchr::memchr2(head, upper, rest)
        }?;
        let pos = at + hit;
        if starts_with_ci(doc, pos, pattern) {
            return Some(pos);
        }
        at = pos + 1;
    }
    None
}

/// Offset of `byte` at or after `from`.
#[inline]
pub(crate) fn find_byte(doc: &[u8], from: usize, byte: u8) -> Option<usize> {
    doc.get(from..).and_then(|rest| memchr(byte, rest)).map(|i| from + i)
}

/// Closing quote of a value opened with `quote` at `value_first - 1`.
///
/// Prefers a quote followed by a separator so embedded quotes do not close
/// the value early; falls back to the first matching quote.
pub(crate) fn closing_quote(doc: &[u8], value_first: usize, quote: u8) -> Option<usize> {
    let first = find_byte(doc, value_first, quote)?;
    let mut candidate = first;
    loop {
        match doc.get(candidate + 1) {
            None => return Some(candidate),
            Some(&b) if is_separator(b) => return Some(candidate),
            Some(_) => {}
        }
        match find_byte(doc, candidate + 1, quote) {
            Some(next) => candidate = next,
            None => return Some(first),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_prefix() {
        assert!(starts_with_ci(b"<SCRIPT", 1, b"script"));
        assert!(!starts_with_ci(b"<scr", 1, b"script"));
        assert_eq!(match_ws(b"  Src=", 0, b"src"), Some(5));
    }

    #[test]
    fn find_ignores_case() {
        assert_eq!(find_ci(b"abc</ScRiPt>", 0, b"</script"), Some(3));
        assert_eq!(find_ci(b"abc</scrip", 0, b"</script"), None);
        assert_eq!(find_ci(b"URL(x) url(y)", 1, b"url("), Some(7));
    }

    #[test]
    fn quote_heuristic_skips_embedded_quotes() {
        let doc = br#"title="5"x" q"#;
        assert_eq!(closing_quote(doc, 7, b'"'), Some(10));
        let doc = br#"src="a.png">"#;
        assert_eq!(closing_quote(doc, 5, b'"'), Some(10));
        let doc = br#"v="a"b"#;
        assert_eq!(closing_quote(doc, 3, b'"'), Some(4));
        assert_eq!(closing_quote(b"v=\"abc", 3, b'"'), None);
    }
}
