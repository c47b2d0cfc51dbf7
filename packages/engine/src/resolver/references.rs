//! URL-bearing references of a scanned page
//!
//! One [`Reference`] per Img, Input, CssImage, Script and stylesheet Link
//! record whose URL resolves to something fetchable. Repeats of an absolute
//! URL point back at the first occurrence, which carries the total count.

use std::collections::HashMap;

use url::Url;

use crate::config::DomainConfig;
use crate::http::url::absolutize;
use crate::resource::ResourceKind;
use crate::scanner::{Record, RecordKind, Scan, Span, field};
use crate::scanner::matcher::find_ci;

/// Script `type` values that still mean JavaScript
const JS_TYPES: [&str; 6] = [
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "text/ecmascript",
    "application/ecmascript",
    "text/jscript",
];

/// How a reference could be inlined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefClass {
    /// `src`/`url()` value replaced by a data URI
    Image,
    /// Whole `<script src>` element replaced by an inline script
    Script,
    /// Whole `<link rel=stylesheet>` element replaced by a `<style>` block
    Stylesheet,
}

impl RefClass {
    /// Resource kind that can stand in for this reference.
    #[must_use]
    pub fn kind(self) -> ResourceKind {
        match self {
            RefClass::Image => ResourceKind::Image,
            RefClass::Script => ResourceKind::Js,
            RefClass::Stylesheet => ResourceKind::Css,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Index of the scan record
    pub record: usize,
    pub record_kind: RecordKind,
    pub class: RefClass,
    /// Whole construct (`<script ...>...</script>`, the `<link>` tag, ...)
    pub whole: Span,
    /// The URL attribute value
    pub url_span: Span,
    /// `media` attribute of a stylesheet link
    pub media: Option<Span>,
    pub url: Url,
    pub in_ie_comment: bool,
    /// Position of the first reference to the same URL, `None` on the first itself
    pub first: Option<usize>,
    /// References to this URL in the document (first occurrence only; 1 on repeats)
    pub occurrences: usize,
}

impl Reference {
    #[must_use]
    pub fn is_repeat(&self) -> bool {
        self.first.is_some()
    }

    /// Referenced once and outside IE conditional comments.
    #[must_use]
    pub fn may_inline(&self) -> bool {
        self.first.is_none() && self.occurrences == 1 && !self.in_ie_comment
    }
}

/// Collect the page's references in document order.
///
/// Skips values that cannot be fetched, URLs matching the domain's
/// no-inline patterns, non-stylesheet links and scripts of a non-JavaScript
/// type.
#[must_use]
pub fn extract(doc: &[u8], scan: &Scan, base: &Url, domain: &DomainConfig) -> Vec<Reference> {
    let mut refs: Vec<Reference> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for record in scan.records() {
        let Some(class) = classify(doc, &record) else {
            continue;
        };
        let Some(url_span) = record.url_span().filter(|s| !s.is_empty()) else {
            continue;
        };
        let raw = String::from_utf8_lossy(url_span.slice(doc));
        let Some(url) = absolutize(base, &raw) else {
            continue;
        };
        if domain.is_no_inline(url.as_str()) {
            tracing::trace!(target: "htmlspeed::resolver", url = %url, "Matches no-inline pattern");
            continue;
        }

        let position = refs.len();
        let first = match seen.get(url.as_str()) {
            Some(&first) => {
                if let Some(head) = refs.get_mut(first) {
                    head.occurrences += 1;
                }
                Some(first)
            }
            None => {
                seen.insert(url.as_str().to_string(), position);
                None
            }
        };
        let media = (record.kind() == RecordKind::Link)
            .then(|| record.span(field::VALUE3))
            .flatten();
        refs.push(Reference {
            record: record.index(),
            record_kind: record.kind(),
            class,
            whole: record.whole(),
            url_span,
            media,
            url,
            in_ie_comment: record.in_ie_comment(),
            first,
            occurrences: 1,
        });
    }
    refs
}

fn classify(doc: &[u8], record: &Record<'_>) -> Option<RefClass> {
    match record.kind() {
        RecordKind::Img | RecordKind::Input | RecordKind::CssImage => Some(RefClass::Image),
        RecordKind::Script => {
            let is_js = record.span(field::SCRIPT_TYPE).is_none_or(|s| {
                let kind = String::from_utf8_lossy(s.slice(doc));
                let kind = kind.trim();
                kind.is_empty() || JS_TYPES.iter().any(|js| kind.eq_ignore_ascii_case(js))
            });
            is_js.then_some(RefClass::Script)
        }
        RecordKind::Link => {
            let rel = record.span(field::VALUE2)?.slice(doc);
            find_ci(rel, 0, b"stylesheet")
                .filter(|_| find_ci(rel, 0, b"alternate").is_none())
                .map(|_| RefClass::Stylesheet)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainSpec;
    use crate::scanner::{ScanConfig, scan};

    fn refs(doc: &str, domain: &DomainConfig) -> Vec<Reference> {
        let base = Url::parse("http://a.com/dir/page.html").unwrap();
        let scanned = scan(doc.as_bytes(), ScanConfig::html());
        extract(doc.as_bytes(), &scanned, &base, domain)
    }

    #[test]
    fn resolves_relative_urls_against_base() {
        let found = refs(
            r#"<img src="i.png"><script src="/js/a.js"></script><link rel="stylesheet" href="../s.css">"#,
            &DomainConfig::fallback(),
        );
        let urls: Vec<&str> = found.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            ["http://a.com/dir/i.png", "http://a.com/js/a.js", "http://a.com/s.css"]
        );
        assert_eq!(found[0].class, RefClass::Image);
        assert_eq!(found[1].class, RefClass::Script);
        assert_eq!(found[2].class, RefClass::Stylesheet);
    }

    #[test]
    fn skips_unfetchable_and_foreign_types() {
        let found = refs(
            concat!(
                r#"<img src="data:image/png;base64,AAA="><img src="about:blank">"#,
                r#"<img src="x.png#frag"><script type="text/template" src="t.html"></script>"#,
                r#"<link rel="icon" href="favicon.ico"><link rel="alternate stylesheet" href="alt.css">"#,
            ),
            &DomainConfig::fallback(),
        );
        assert!(found.is_empty(), "{found:?}");
    }

    #[test]
    fn no_inline_patterns_drop_references() {
        let domain = DomainSpec {
            no_inline_patterns: vec![r"/ads/".into()],
            ..DomainSpec::new("a.com")
        }
        .compile()
        .unwrap();
        let found = refs(r#"<img src="/ads/b.png"><img src="/logo.png">"#, &domain);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url.as_str(), "http://a.com/logo.png");
    }

    #[test]
    fn repeats_point_at_first_occurrence_across_spellings() {
        let found = refs(
            r#"<img src="/i.png"><img src="http://a.com/i.png"><div style="background:url(i.png)"></div>"#,
            &DomainConfig::fallback(),
        );
        // The third spelling is relative to /dir/.
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].occurrences, 2);
        assert_eq!(found[1].first, Some(0));
        assert!(!found[0].may_inline());
        assert!(found[2].may_inline());
        assert_eq!(found[2].record_kind, RecordKind::CssImage);
    }

    #[test]
    fn stylesheet_media_is_kept() {
        let found = refs(
            r#"<link rel="stylesheet" media="print" href="p.css">"#,
            &DomainConfig::fallback(),
        );
        let doc = r#"<link rel="stylesheet" media="print" href="p.css">"#;
        let media = found[0].media.expect("media span");
        assert_eq!(&doc[media.first..media.last], "print");
    }
}
