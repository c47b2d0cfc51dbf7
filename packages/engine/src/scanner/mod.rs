//! Byte-level HTML/CSS scanner
//!
//! Produces the flat [`Records`] array every later stage works from. No tree
//! is built and nothing is copied: records are byte offsets into the
//! document. The scanner is a lenient heuristic; malformed markup yields
//! fewer records, never an error.

mod css;
mod html;
pub(crate) mod matcher;
pub mod record;

pub use record::{Dup, Record, RecordKind, Records, Span, field};

pub(crate) use css::url_value;

/// What to scan for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanConfig {
    /// The document is a stylesheet, not HTML
    pub css: bool,
    /// Emit anchor, form and event-handler records (content-first mode)
    pub track_anchors: bool,
}

impl ScanConfig {
    #[must_use]
    pub fn html() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn css() -> Self {
        Self {
            css: true,
            track_anchors: false,
        }
    }

    #[must_use]
    pub fn content_first() -> Self {
        Self {
            css: false,
            track_anchors: true,
        }
    }
}

/// The first `<base>` tag of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseTag {
    /// Index of its record
    pub record: usize,
    pub tag: Span,
    pub href: Option<Span>,
    pub target: Option<Span>,
}

/// Scanner output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    records: Records,
    base: Option<BaseTag>,
    meta_content_type: Option<Span>,
}

impl Scan {
    #[must_use]
    pub fn records(&self) -> &Records {
        &self.records
    }

    #[must_use]
    pub fn base(&self) -> Option<&BaseTag> {
        self.base.as_ref()
    }

    /// `href` of the first `<base>` tag
    #[must_use]
    pub fn base_href<'d>(&self, doc: &'d [u8]) -> Option<&'d [u8]> {
        self.base.and_then(|b| b.href).map(|s| s.slice(doc))
    }

    /// `content` of `<meta http-equiv="Content-Type">`
    #[must_use]
    pub fn meta_content_type<'d>(&self, doc: &'d [u8]) -> Option<&'d [u8]> {
        self.meta_content_type.map(|s| s.slice(doc))
    }
}

/// Scan `doc` in one forward pass.
#[must_use]
pub fn scan(doc: &[u8], config: ScanConfig) -> Scan {
    let scan = if i32::try_from(doc.len()).is_ok() {
        html::HtmlScanner::new(doc, config).run()
    } else {
        // Offsets would not fit the record fields.
        html::HtmlScanner::new(&[], config).run()
    };
    tracing::trace!(
        target: "htmlspeed::scanner",
        size = doc.len(),
        records = scan.records.count(),
        css = config.css,
        "Scanned document"
    );
    scan
}

/// Fast pre-check: does `bytes` look like markup rather than script?
#[must_use]
pub fn is_html(bytes: &[u8]) -> bool {
    html::is_html(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(scan: &Scan) -> Vec<RecordKind> {
        scan.records().iter().map(|r| r.kind()).collect()
    }

    fn text<'d>(doc: &'d str, span: Option<Span>) -> &'d str {
        std::str::from_utf8(span.expect("span present").slice(doc.as_bytes())).unwrap()
    }

    #[test]
    fn rescanning_is_byte_identical() {
        let doc = br#"<html><head><link rel=stylesheet href="a.css"><script src="a.js"></script>
            <style>p{background:url(p.png)}</style></head><body onload="go()"><img src="i.png">
            <iframe src="/f"></iframe></body></html>"#;
        let a = scan(doc, ScanConfig::content_first());
        let b = scan(doc, ScanConfig::content_first());
        assert_eq!(a.records().as_slice(), b.records().as_slice());
    }

    #[test]
    fn duplicates_point_at_first_occurrence() {
        let doc = r#"<p>x</p><img src="X"><img src="X"><img src='X'>"#;
        let scan = scan(doc.as_bytes(), ScanConfig::html());
        let imgs: Vec<_> = scan
            .records()
            .iter()
            .filter(|r| r.kind() == RecordKind::Img)
            .collect();
        assert_eq!(imgs.len(), 3);
        let first = imgs[0].index();
        assert_eq!(imgs[0].field(4), -2);
        assert_eq!(imgs[0].dup(), Dup::First { further: 2 });
        for later in &imgs[1..] {
            assert_eq!(later.field(4), first as i32);
            assert_eq!(later.dup(), Dup::Repeat { first_index: first });
        }
    }

    #[test]
    fn classes_do_not_share_duplicates() {
        let doc = r#"<head></head><script src="x"></script><img src="x">"#;
        let scan = scan(doc.as_bytes(), ScanConfig::html());
        assert!(scan.records().iter().all(|r| r.dup() == Dup::Unique));
    }

    #[test]
    fn offsets_are_monotonic_and_terminated() {
        let doc = br#"<head><title>t</title></head><body style="background:url(b.png)" onclick="a()">
            <a href="/x" target="_self" onmouseover="h()">x</a><form target=_parent></form></body>"#;
        let scan = scan(doc, ScanConfig::content_first());
        let firsts: Vec<usize> = scan.records().iter().map(|r| r.first()).collect();
        assert!(firsts.windows(2).all(|w| w[0] <= w[1]), "{firsts:?}");
        let kinds = kinds(&scan);
        assert_eq!(kinds.last(), Some(&RecordKind::Eof));
        assert_eq!(kinds.iter().filter(|k| **k == RecordKind::Eof).count(), 1);
        assert_eq!(
            kinds,
            [
                RecordKind::Head,
                RecordKind::Body,
                RecordKind::CssImage,
                RecordKind::Event,
                RecordKind::AnchorTag,
                RecordKind::Event,
                RecordKind::Form,
                RecordKind::Eof,
            ]
        );
    }

    #[test]
    fn script_bodies_hide_markup() {
        let doc = r#"<script>document.write('<img src="no.png">')</script><img src="yes.png">"#;
        let scan = scan(doc.as_bytes(), ScanConfig::html());
        let urls: Vec<&str> = scan
            .records()
            .iter()
            .filter(|r| r.kind() == RecordKind::Img)
            .map(|r| text(doc, r.url_span()))
            .collect();
        assert_eq!(urls, ["yes.png"]);
    }

    #[test]
    fn script_record_layout() {
        let doc = r#"<SCRIPT type="text/javascript" src = "a.js" ></script >"#;
        let scan = scan(doc.as_bytes(), ScanConfig::html());
        let script = scan.records().iter().next().unwrap();
        assert_eq!(script.kind(), RecordKind::Script);
        assert_eq!(text(doc, script.span(field::SCRIPT_SRC)), "a.js");
        assert_eq!(text(doc, script.span(field::SCRIPT_TYPE)), "text/javascript");
        assert_eq!(script.field(field::SCRIPT_OPEN_LAST) as usize, doc.find("</").unwrap());
        assert_eq!(script.field(field::SCRIPT_CLOSE_FIRST) as usize, doc.find("</").unwrap());
        assert_eq!(script.last(), doc.len());
    }

    #[test]
    fn conditional_comments_flag_records() {
        let doc = r#"<!--[if lt IE 9]><script src="shim.js"></script><![endif]--><script src="app.js"></script>"#;
        let scan = scan(doc.as_bytes(), ScanConfig::html());
        let flags: Vec<bool> = scan.records().iter().filter(|r| r.kind() == RecordKind::Script).map(|r| r.in_ie_comment()).collect();
        assert_eq!(flags, [true, false]);
    }

    #[test]
    fn plain_comments_are_skipped() {
        let doc = r#"<!-- <img src="hidden.png"> --><img src="shown.png"><!---->"#;
        let scan = scan(doc.as_bytes(), ScanConfig::html());
        let imgs: Vec<_> = scan.records().iter().filter(|r| r.kind() == RecordKind::Img).collect();
        assert_eq!(imgs.len(), 1);
        assert_eq!(text(doc, imgs[0].url_span()), "shown.png");
    }

    #[test]
    fn anchors_only_when_tracked() {
        let doc = r#"<a href="/x" onclick="f()">x</a>"#;
        assert_eq!(kinds(&scan(doc.as_bytes(), ScanConfig::html())), [RecordKind::Eof]);
        assert_eq!(
            kinds(&scan(doc.as_bytes(), ScanConfig::content_first())),
            [RecordKind::AnchorTag, RecordKind::Event, RecordKind::Eof]
        );
    }

    #[test]
    fn base_and_meta_are_captured() {
        let doc = r#"<head><meta http-equiv="Content-Type" content="text/html; charset=utf-8"><base href="http://a.com/d/" target=_blank></head>"#;
        let scan = scan(doc.as_bytes(), ScanConfig::html());
        assert_eq!(scan.base_href(doc.as_bytes()), Some(&b"http://a.com/d/"[..]));
        assert_eq!(
            scan.meta_content_type(doc.as_bytes()),
            Some(&b"text/html; charset=utf-8"[..])
        );
        let base = scan.base().unwrap();
        assert_eq!(text(doc, base.target), "_blank");
        assert!(kinds(&scan).contains(&RecordKind::Meta));
    }

    #[test]
    fn style_block_records() {
        let doc = "<style media=print>a{background-image:url('x.png')}</style>";
        let scan = scan(doc.as_bytes(), ScanConfig::html());
        let records: Vec<_> = scan.records().iter().collect();
        assert_eq!(records[0].kind(), RecordKind::StyleStart);
        assert_eq!(text(doc, records[0].span(field::VALUE)), "print");
        assert_eq!(records[1].kind(), RecordKind::CssImage);
        assert_eq!(text(doc, records[1].url_span()), "x.png");
        assert_eq!(records[2].kind(), RecordKind::StyleEnd);
    }

    #[test]
    fn truncated_documents_stop_quietly() {
        for doc in [
            "<img src=\"a.png\"><img src=\"b.png",
            "<img src=\"a.png\"><script>var x = 1;",
            "<img src=\"a.png\"><!-- never closed <img src=\"c.png\">",
            "<img src=\"a.png\"><style>p{}",
        ] {
            let scan = scan(doc.as_bytes(), ScanConfig::html());
            assert_eq!(kinds(&scan), [RecordKind::Img, RecordKind::Eof], "{doc}");
        }
    }

    #[test]
    fn css_mode_finds_backgrounds() {
        let css = "a{background:url(a.png)} b{background:url(a.png)} c{src:url(f.woff)}";
        let scan = scan(css.as_bytes(), ScanConfig::css());
        let images: Vec<_> = scan.records().iter().filter(|r| r.kind() == RecordKind::CssImage).collect();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].dup(), Dup::First { further: 1 });
    }

    #[test]
    fn html_precheck() {
        assert!(is_html(b"\xEF\xBB\xBF  <!doctype html>"));
        assert!(is_html(b"/* banner */\n<html>"));
        assert!(is_html(b"\n\t<div>"));
        assert!(!is_html(b"var x = '<b>';"));
        assert!(!is_html(b"// comment\nalert(1)"));
        assert!(!is_html(b""));
    }

    #[test]
    fn links_keep_rel_and_media() {
        let doc = r#"<link href="a.css" rel="stylesheet" media="screen"/>"#;
        let scan = scan(doc.as_bytes(), ScanConfig::html());
        let link = scan.records().iter().next().unwrap();
        assert_eq!(link.kind(), RecordKind::Link);
        assert_eq!(text(doc, link.url_span()), "a.css");
        assert_eq!(text(doc, link.span(field::VALUE2)), "stylesheet");
        assert_eq!(text(doc, link.span(field::VALUE3)), "screen");
        assert_eq!(link.last(), doc.len());
    }
}
