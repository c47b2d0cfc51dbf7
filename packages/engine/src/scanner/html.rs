//! Single-pass HTML scanner
//!
//! One forward cursor jumps from `<` to `<`. Known tags have their
//! attributes of interest located and are emitted as records when their `>`
//! is reached; script and style bodies are skipped wholesale so nothing
//! inside them is mistaken for markup. An unterminated construct ends the
//! scan without a record for it.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use memchr::memchr;

use super::css::background_urls;
use super::matcher::{
    closing_quote, find_byte, find_ci, is_space, match_ws, skip_space, starts_with_ci,
};
use super::record::{Records, RecordKind, Span, offset};
use super::{BaseTag, Scan, ScanConfig};

/// Tags the scanner emits records for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Script,
    Link,
    Style,
    Img,
    Frame,
    Iframe,
    Head,
    Body,
    Anchor,
    Input,
    Form,
    Base,
    Meta,
    /// Any other element; only `style=` and event handlers are looked at
    Other,
}

impl Tag {
    fn from_name(name: &[u8]) -> Tag {
        const NAMES: [(&[u8], Tag); 13] = [
            (b"script", Tag::Script),
            (b"link", Tag::Link),
            (b"style", Tag::Style),
            (b"img", Tag::Img),
            (b"frame", Tag::Frame),
            (b"iframe", Tag::Iframe),
            (b"head", Tag::Head),
            (b"body", Tag::Body),
            (b"a", Tag::Anchor),
            (b"input", Tag::Input),
            (b"form", Tag::Form),
            (b"base", Tag::Base),
            (b"meta", Tag::Meta),
        ];
        NAMES
            .iter()
            .find(|(n, _)| name.eq_ignore_ascii_case(n))
            .map_or(Tag::Other, |&(_, tag)| tag)
    }

    /// Whether attribute `name` matters for this tag
    fn wants(self, name: &[u8]) -> Option<Attr> {
        let attr = Attr::from_name(name)?;
        let wanted = match attr {
            Attr::Style | Attr::Event => true,
            Attr::Src => matches!(
                self,
                Tag::Script | Tag::Img | Tag::Frame | Tag::Iframe | Tag::Input
            ),
            Attr::Href => matches!(self, Tag::Link | Tag::Anchor | Tag::Base),
            Attr::Rel => self == Tag::Link,
            Attr::Media => matches!(self, Tag::Link | Tag::Style),
            Attr::Type => matches!(self, Tag::Script | Tag::Input),
            Attr::Target => matches!(self, Tag::Anchor | Tag::Form | Tag::Base),
            Attr::Onload => self == Tag::Body,
            Attr::HttpEquiv | Attr::Content => self == Tag::Meta,
        };
        wanted.then_some(attr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attr {
    Src,
    Href,
    Rel,
    Media,
    Type,
    Style,
    Target,
    Onload,
    /// `onclick` / `onmouse*`
    Event,
    HttpEquiv,
    Content,
}

impl Attr {
    fn from_name(name: &[u8]) -> Option<Attr> {
        const NAMES: [(&[u8], Attr); 10] = [
            (b"src", Attr::Src),
            (b"href", Attr::Href),
            (b"rel", Attr::Rel),
            (b"media", Attr::Media),
            (b"type", Attr::Type),
            (b"style", Attr::Style),
            (b"target", Attr::Target),
            (b"onload", Attr::Onload),
            (b"http-equiv", Attr::HttpEquiv),
            (b"content", Attr::Content),
        ];
        if let Some(&(_, attr)) = NAMES.iter().find(|(n, _)| name.eq_ignore_ascii_case(n)) {
            return Some(attr);
        }
        let has_prefix =
            |p: &[u8]| name.len() >= p.len() && name[..p.len()].eq_ignore_ascii_case(p);
        (name.eq_ignore_ascii_case(b"onclick") || has_prefix(b"onmouse")).then_some(Attr::Event)
    }
}

/// Attribute spans of the tag being scanned
#[derive(Debug, Default)]
struct Attrs {
    src: Option<Span>,
    href: Option<Span>,
    rel: Option<Span>,
    media: Option<Span>,
    kind: Option<Span>,
    style: Option<Span>,
    target: Option<Span>,
    onload: Option<Span>,
    http_equiv: Option<Span>,
    content: Option<Span>,
    /// (attribute name offset, value span)
    events: Vec<(usize, Span)>,
}

impl Attrs {
    fn set(&mut self, attr: Attr, name_first: usize, value: Span) {
        let slot = match attr {
            Attr::Src => &mut self.src,
            Attr::Href => &mut self.href,
            Attr::Rel => &mut self.rel,
            Attr::Media => &mut self.media,
            Attr::Type => &mut self.kind,
            Attr::Style => &mut self.style,
            Attr::Target => &mut self.target,
            Attr::Onload => &mut self.onload,
            Attr::HttpEquiv => &mut self.http_equiv,
            Attr::Content => &mut self.content,
            Attr::Event => {
                self.events.push((name_first, value));
                return;
            }
        };
        // First occurrence wins, as browsers do.
        if slot.is_none() {
            *slot = Some(value);
        }
    }
}

/// Duplicate classes: references of different classes never share a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum UrlClass {
    Image,
    Script,
    Stylesheet,
}

pub(super) struct HtmlScanner<'a> {
    doc: &'a [u8],
    config: ScanConfig,
    records: Records,
    /// (class, raw URL) -> (first occurrence's index, its dup field slot)
    first_seen: HashMap<(UrlClass, &'a [u8]), (usize, usize)>,
    in_ie_comment: bool,
    base: Option<BaseTag>,
    meta_content_type: Option<Span>,
    /// Attribute-derived records waiting for their element's record
    pending: Vec<(RecordKind, [i32; 3])>,
}

impl<'a> HtmlScanner<'a> {
    pub(super) fn new(doc: &'a [u8], config: ScanConfig) -> Self {
        Self {
            doc,
            config,
            records: Records::with_capacity(64 + doc.len() / 64),
            first_seen: HashMap::new(),
            in_ie_comment: false,
            base: None,
            meta_content_type: None,
            pending: Vec::new(),
        }
    }

    pub(super) fn run(mut self) -> Scan {
        if self.config.css {
            self.emit_css_images(0, self.doc.len());
        } else {
            let mut pos = 0;
            while let Some(at) = find_byte(self.doc, pos, b'<') {
                match self.at_open(at) {
                    Some(next) => pos = next,
                    None => break,
                }
            }
        }
        self.records.push(RecordKind::Eof, &[offset(self.doc.len())]);
        Scan {
            records: self.records,
            base: self.base,
            meta_content_type: self.meta_content_type,
        }
    }

    /// Handle the construct starting at `doc[at] == b'<'`; returns where to
    /// continue, or `None` when the rest of the document is unusable.
    fn at_open(&mut self, at: usize) -> Option<usize> {
        let doc = self.doc;
        if starts_with_ci(doc, at, b"<!--") {
            return self.comment(at);
        }
        if starts_with_ci(doc, at, b"<![endif]") {
            self.in_ie_comment = false;
            return find_byte(doc, at, b'>').map(|gt| gt + 1);
        }
        if starts_with_ci(doc, at, b"<!") || starts_with_ci(doc, at, b"</") {
            return Some(at + 2);
        }

        let name_first = skip_space(doc, at + 1);
        let mut name_last = name_first;
        while name_last < doc.len()
            && (doc[name_last].is_ascii_alphanumeric() || matches!(doc[name_last], b'-' | b':'))
        {
            name_last += 1;
        }
        if name_last == name_first || !doc[name_first].is_ascii_alphabetic() {
            return Some(at + 1);
        }
        let tag = Tag::from_name(&doc[name_first..name_last]);
        self.element(tag, at, name_last)
    }

    fn comment(&mut self, at: usize) -> Option<usize> {
        let doc = self.doc;
        let body = at + b"<!--".len();
        if doc.get(body) == Some(&b'>') {
            return Some(body + 1);
        }
        if match_ws(doc, body, b"[if").is_some() {
            // Conditional comment contents are scanned; records carry the flag.
            self.in_ie_comment = true;
            return find_byte(doc, body, b'>').map(|gt| gt + 1);
        }
        if starts_with_ci(doc, body, b"<![endif]") {
            self.in_ie_comment = false;
            return find_byte(doc, body, b'>').map(|gt| gt + 1);
        }
        find_ci(doc, body, b"-->").map(|end| end + 3)
    }

    fn element(&mut self, tag: Tag, first: usize, attrs_first: usize) -> Option<usize> {
        let (attrs, last) = self.attributes(tag, attrs_first)?;
        let tracked = self.config.track_anchors;

        if let Some(style) = attrs.style {
            self.queue_css_images(style);
        }
        if tracked {
            for &(name_first, value) in &attrs.events {
                let [f, l] = Span::fields(Some(value));
                self.pending.push((RecordKind::Event, [f, l, offset(name_first)]));
            }
        }

        let next = match tag {
            Tag::Script => return self.script(first, last, &attrs),
            Tag::Style => return self.style(first, last, &attrs),
            Tag::Link => {
                let class = if is_stylesheet(self.doc, attrs.rel) {
                    UrlClass::Stylesheet
                } else {
                    UrlClass::Image
                };
                let ie = i32::from(self.in_ie_comment);
                let [hf, hl] = Span::fields(attrs.href);
                let [rf, rl] = Span::fields(attrs.rel);
                let [mf, ml] = Span::fields(attrs.media);
                let fields = [offset(first), offset(last), hf, hl, rf, rl, mf, ml, ie, 0];
                self.emit_with_dup(RecordKind::Link, fields, class, attrs.href);
                last
            }
            Tag::Img | Tag::Input if attrs.src.is_some() => {
                let [sf, sl] = Span::fields(attrs.src);
                if tag == Tag::Img {
                    let fields = [offset(first), offset(last), sf, sl, 0];
                    self.emit_with_dup(RecordKind::Img, fields, UrlClass::Image, attrs.src);
                } else {
                    let [tf, tl] = Span::fields(attrs.kind);
                    let fields = [offset(first), offset(last), sf, sl, tf, tl, 0];
                    self.emit_with_dup(RecordKind::Input, fields, UrlClass::Image, attrs.src);
                }
                last
            }
            Tag::Frame | Tag::Iframe => {
                let kind = if tag == Tag::Frame {
                    RecordKind::Frame
                } else {
                    RecordKind::Iframe
                };
                let [sf, sl] = Span::fields(attrs.src);
                self.emit(kind, &[offset(first), offset(last), sf, sl]);
                last
            }
            Tag::Head => {
                self.emit(RecordKind::Head, &[offset(first), offset(last)]);
                last
            }
            Tag::Body => {
                let [of, ol] = Span::fields(attrs.onload);
                self.emit(RecordKind::Body, &[offset(first), offset(last), of, ol]);
                last
            }
            Tag::Anchor if tracked => {
                let [hf, hl] = Span::fields(attrs.href);
                let [tf, tl] = Span::fields(attrs.target);
                self.emit(RecordKind::AnchorTag, &[offset(first), offset(last), hf, hl, tf, tl]);
                last
            }
            Tag::Form if tracked => {
                let [tf, tl] = Span::fields(attrs.target);
                self.emit(RecordKind::Form, &[offset(first), offset(last), tf, tl]);
                last
            }
            Tag::Base => {
                let [hf, hl] = Span::fields(attrs.href);
                let [tf, tl] = Span::fields(attrs.target);
                let index =
                    self.emit(RecordKind::Base, &[offset(first), offset(last), hf, hl, tf, tl]);
                if self.base.is_none() {
                    self.base = Some(BaseTag {
                        record: index,
                        tag: Span::new(first, last),
                        href: attrs.href,
                        target: attrs.target,
                    });
                }
                last
            }
            Tag::Meta if attrs.http_equiv.is_some() => {
                let [ef, el] = Span::fields(attrs.http_equiv);
                let [cf, cl] = Span::fields(attrs.content);
                self.emit(RecordKind::Meta, &[offset(first), offset(last), ef, el, cf, cl]);
                if self.meta_content_type.is_none()
                    && attrs
                        .http_equiv
                        .is_some_and(|s| s.slice(self.doc).eq_ignore_ascii_case(b"content-type"))
                {
                    self.meta_content_type = attrs.content;
                }
                last
            }
            _ => {
                self.flush_pending();
                last
            }
        };
        Some(next)
    }

    /// Parse attributes from `at` to the tag's `>`; returns them and the
    /// offset just past the tag.
    fn attributes(&self, tag: Tag, mut i: usize) -> Option<(Attrs, usize)> {
        let doc = self.doc;
        let mut attrs = Attrs::default();
        loop {
            i = skip_space(doc, i);
            match *doc.get(i)? {
                b'>' => return Some((attrs, i + 1)),
                b'/' => {
                    i += 1;
                    continue;
                }
                // Missing `>`: the tag ends where the next one starts.
                b'<' => return Some((attrs, i)),
                _ => {}
            }

            let name_first = i;
            while i < doc.len() && !is_space(doc[i]) && !matches!(doc[i], b'=' | b'>' | b'/' | b'<')
            {
                i += 1;
            }
            if i == name_first {
                // A stray `=` or similar.
                i += 1;
                continue;
            }
            let name = &doc[name_first..i];

            let after_name = skip_space(doc, i);
            if doc.get(after_name) != Some(&b'=') {
                i = after_name;
                continue;
            }
            let value_at = skip_space(doc, after_name + 1);
            let value = match *doc.get(value_at)? {
                q @ (b'"' | b'\'') => {
                    let close = closing_quote(doc, value_at + 1, q)?;
                    i = close + 1;
                    Span::new(value_at + 1, close)
                }
                _ => {
                    let mut end = value_at;
                    while end < doc.len() && !is_space(doc[end]) && doc[end] != b'>' {
                        end += 1;
                    }
                    i = end;
                    Span::new(value_at, end)
                }
            };
            if let Some(attr) = tag.wants(name) {
                attrs.set(attr, name_first, trim(doc, value));
            }
        }
    }

    fn script(&mut self, first: usize, open_last: usize, attrs: &Attrs) -> Option<usize> {
        let close_first = find_ci(self.doc, open_last, b"</script")?;
        let last = find_byte(self.doc, close_first, b'>')? + 1;
        let [sf, sl] = Span::fields(attrs.src);
        let [tf, tl] = Span::fields(attrs.kind);
        let fields = [
            offset(first),
            offset(open_last),
            offset(close_first),
            offset(last),
            sf,
            sl,
            tf,
            tl,
            i32::from(self.in_ie_comment),
            0,
        ];
        self.emit_with_dup(RecordKind::Script, fields, UrlClass::Script, attrs.src);
        Some(last)
    }

    fn style(&mut self, first: usize, open_last: usize, attrs: &Attrs) -> Option<usize> {
        let close_first = find_ci(self.doc, open_last, b"</style")?;
        let last = find_byte(self.doc, close_first, b'>')? + 1;
        let [mf, ml] = Span::fields(attrs.media);
        self.emit(RecordKind::StyleStart, &[offset(first), offset(open_last), mf, ml]);
        self.emit_css_images(open_last, close_first);
        self.emit(RecordKind::StyleEnd, &[offset(close_first), offset(last)]);
        Some(last)
    }

    fn queue_css_images(&mut self, style: Span) {
        let mut spans = Vec::new();
        background_urls(self.doc, style.first, style.last, |s| spans.push(s));
        for s in spans {
            let [f, l] = Span::fields(Some(s));
            self.pending.push((RecordKind::CssImage, [f, l, 0]));
        }
    }

    fn emit_css_images(&mut self, from: usize, to: usize) {
        let mut spans = Vec::new();
        background_urls(self.doc, from, to, |s| spans.push(s));
        for s in spans {
            let [f, l] = Span::fields(Some(s));
            self.emit_with_dup(RecordKind::CssImage, [f, l, 0], UrlClass::Image, Some(s));
        }
    }

    /// Emit an element record, then the attribute-derived records queued
    /// while parsing it.
    fn emit(&mut self, kind: RecordKind, fields: &[i32]) -> usize {
        let index = self.records.push(kind, fields);
        self.flush_pending();
        index
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|(_, fields)| fields[0]);
        for (kind, fields) in pending.drain(..) {
            if kind == RecordKind::CssImage {
                let span = usize::try_from(fields[0])
                    .ok()
                    .zip(usize::try_from(fields[1]).ok())
                    .map(|(f, l)| Span::new(f, l));
                self.emit_with_dup(kind, fields, UrlClass::Image, span);
            } else {
                self.records.push(kind, &fields);
            }
        }
        // Hand the allocation back for the next element.
        self.pending = pending;
    }

    fn emit_with_dup<const N: usize>(
        &mut self,
        kind: RecordKind,
        mut fields: [i32; N],
        class: UrlClass,
        url: Option<Span>,
    ) -> usize {
        let index = self.records.as_slice().len();
        let dup_field = kind.dup_field().unwrap_or(N - 1);
        if let Some(url) = url.filter(|s| !s.is_empty()) {
            match self.first_seen.entry((class, url.slice(self.doc))) {
                Entry::Occupied(first) => {
                    let (first_index, first_dup_slot) = *first.get();
                    self.records.adjust(first_dup_slot, -1);
                    fields[dup_field] = offset(first_index);
                    if first_index == 0 {
                        self.records.mark_record_zero_repeat(index);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert((index, index + 1 + dup_field));
                }
            }
        }
        self.records.push(kind, &fields);
        if kind != RecordKind::CssImage {
            self.flush_pending();
        }
        index
    }
}

fn trim(doc: &[u8], mut span: Span) -> Span {
    while span.first < span.last && is_space(doc[span.first]) {
        span.first += 1;
    }
    while span.last > span.first && is_space(doc[span.last - 1]) {
        span.last -= 1;
    }
    span
}

fn is_stylesheet(doc: &[u8], rel: Option<Span>) -> bool {
    rel.is_some_and(|rel| {
        rel.slice(doc)
            .split(|&b| is_space(b))
            .any(|word| word.eq_ignore_ascii_case(b"stylesheet"))
    })
}

/// `bytes` looks like markup: optional BOM, whitespace, one optional leading
/// comment, then `<`.
pub(super) fn is_html(bytes: &[u8]) -> bool {
    let mut i = if bytes.starts_with(b"\xEF\xBB\xBF") { 3 } else { 0 };
    i = skip_space(bytes, i);
    if bytes[i..].starts_with(b"/*") {
        match memchr::memmem::find(&bytes[i + 2..], b"*/") {
            Some(end) => i = skip_space(bytes, i + 2 + end + 2),
            None => return false,
        }
    } else if bytes[i..].starts_with(b"//") {
        match memchr(b'\n', &bytes[i..]) {
            Some(nl) => i = skip_space(bytes, i + nl + 1),
            None => return false,
        }
    }
    bytes.get(i) == Some(&b'<')
}
