//! HtmlSpeed ETag codec
//!
//! State-less: `<originEtag>[<digest><variant>]`, state-full: `<originEtag>{<digest><variant>}`.
//! The digest is the MD5 of the served bytes in unpadded base64 with `/` → `-`
//! and `+` → `_`.

use base64::{Engine as _, engine::general_purpose};
use md5::{Digest, Md5};

use super::Variant;

const TOKEN_LEN: usize = 22;
/// opener + token + variant + closer
const SUFFIX_LEN: usize = TOKEN_LEN + 3;

#[must_use]
pub fn md5_digest(bytes: &[u8]) -> [u8; 16] {
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&Md5::digest(bytes));
    digest
}

/// 22-character digest representation used in ETags and version URLs.
#[must_use]
pub fn digest_token(digest: &[u8; 16]) -> String {
    general_purpose::STANDARD_NO_PAD
        .encode(digest)
        .chars()
        .map(|c| match c {
            '/' => '-',
            '+' => '_',
            other => other,
        })
        .collect()
}

#[must_use]
pub fn to_etag(origin_etag: Option<&str>, token: &str, variant: Variant, state_full: bool) -> String {
    let (open, close) = if state_full { ('{', '}') } else { ('[', ']') };
    let origin = origin_etag.unwrap_or("");
    let mut etag = String::with_capacity(origin.len() + SUFFIX_LEN);
    etag.push_str(origin);
    etag.push(open);
    etag.push_str(token);
    etag.push(variant.as_char());
    etag.push(close);
    etag
}

/// Components of an ETag this accelerator produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedEtag<'a> {
    pub origin: &'a str,
    pub token: &'a str,
    pub variant: Variant,
    pub state_full: bool,
}

#[must_use]
pub fn parse_etag(etag: &str) -> Option<ParsedEtag<'_>> {
    let etag = etag.trim();
    let bytes = etag.as_bytes();
    if bytes.len() < SUFFIX_LEN {
        return None;
    }
    let start = bytes.len() - SUFFIX_LEN;
    let state_full = match (bytes[start], bytes[bytes.len() - 1]) {
        (b'[', b']') => false,
        (b'{', b'}') => true,
        _ => return None,
    };
    let token = etag.get(start + 1..start + 1 + TOKEN_LEN)?;
    if !token
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return None;
    }
    let variant = Variant::from_byte(bytes[bytes.len() - 2])?;
    Some(ParsedEtag {
        origin: etag.get(..start)?,
        token,
        variant,
        state_full,
    })
}

#[must_use]
pub fn is_html_speed_etag(etag: &str) -> bool {
    parse_etag(etag).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::ALL_VARIANTS;

    #[test]
    fn digest_token_is_22_url_safe_chars() {
        let token = digest_token(&md5_digest(b"hello world"));
        // base64("XrY7u+Ae7tCTyyK7j1rNww==")
        assert_eq!(token, "XrY7u_Ae7tCTyyK7j1rNww");
        assert_eq!(token.len(), 22);
    }

    #[test]
    fn slash_maps_to_dash() {
        let digest = [0xffu8; 16];
        let token = digest_token(&digest);
        assert!(token.starts_with("-----"));
    }

    #[test]
    fn etag_round_trips_every_variant() {
        let token = digest_token(&md5_digest(b"<html></html>"));
        for c in ALL_VARIANTS.chars() {
            let v = Variant::from_char(c).unwrap();
            for state_full in [false, true] {
                let etag = to_etag(Some("\"abc\""), &token, v, state_full);
                assert!(is_html_speed_etag(&etag));
                let parsed = parse_etag(&etag).unwrap();
                assert_eq!(parsed.variant, v);
                assert_eq!(parsed.origin, "\"abc\"");
                assert_eq!(parsed.token, token);
                assert_eq!(parsed.state_full, state_full);
            }
        }
    }

    #[test]
    fn state_full_uses_braces() {
        let token = digest_token(&md5_digest(b"x"));
        let etag = to_etag(None, &token, Variant::from_char('0').unwrap(), true);
        assert!(etag.starts_with('{') && etag.ends_with("0}"));
        assert_eq!(etag.len(), 25);
    }

    #[test]
    fn foreign_etags_are_rejected() {
        assert!(!is_html_speed_etag("\"5f3e-1a2b\""));
        assert!(!is_html_speed_etag("[short0]"));
        assert!(!is_html_speed_etag("[XrY7u_Ae7tCTyyK7j1rNwwz]"));
        assert!(!is_html_speed_etag("[XrY7u_Ae7tCTyyK7j1rNww0}"));
    }

    #[test]
    fn multibyte_text_is_rejected_not_split() {
        assert!(parse_etag("[aaaaaaaaaaaaaaaaaaaaa\u{e9}]").is_none());
        assert!(parse_etag("{\u{e9}aaaaaaaaaaaaaaaaaaaaa0}").is_none());
        assert!(!is_html_speed_etag("\"\u{5d0}\u{5d1}\u{5d2}\u{5d3}\u{5d4}\u{5d5}\u{5d6}\u{5d7}\u{5d8}\u{5d9}\u{5da}\u{5db}\u{5dc}\""));
    }
}
