//! Content-first rewriting
//!
//! Defers script-driven work until the page's content has rendered: event
//! handlers queue behind the window `load` event, iframes and configured
//! scripts load after it, and links escape the frame the page may be shown in.

use url::Url;

use super::edits::{Edit, Piece};
use crate::config::DomainConfig;
use crate::http::url::absolutize;
use crate::scanner::{Record, RecordKind, Scan, Span, field};

/// Runtime for `hsDefer` / `hsLoad`, injected right after `<head>`
pub const BOOTSTRAP: &str = concat!(
    "var hsQ=[],hsOk=0;",
    "function hsDefer(f){hsOk?f():hsQ.push(f)}",
    "function hsLoad(u){hsDefer(function(){var s=document.createElement('script');",
    "s.src=u;document.body.appendChild(s)})}",
    "window.addEventListener('load',function(){hsOk=1;",
    "var f=document.getElementsByTagName('iframe');",
    "for(var i=0;i<f.length;i++){var s=f[i].getAttribute('data-hssrc');if(s)f[i].src=s}",
    "while(hsQ.length)hsQ.shift()()});",
);

const HANDLER_OPEN: &[u8] = b"hsDefer(function(){";
const HANDLER_CLOSE: &[u8] = b"})";

/// Record indices of scripts replaced by `hsLoad` calls
pub(crate) fn deferred_scripts(doc: &[u8], scan: &Scan, base: &Url, domain: &DomainConfig) -> Vec<usize> {
    if !domain.content_first {
        return Vec::new();
    }
    scan.records()
        .iter()
        .filter(|r| r.kind() == RecordKind::Script)
        .filter(|r| {
            script_url(doc, r, base).is_some_and(|url| domain.is_deferred_script(url.as_str()))
        })
        .map(|r| r.index())
        .collect()
}

fn script_url(doc: &[u8], record: &Record<'_>, base: &Url) -> Option<Url> {
    let src = record.span(field::SCRIPT_SRC)?;
    absolutize(base, &String::from_utf8_lossy(src.slice(doc)))
}

/// Structural edits for content-first mode.
pub(crate) fn edits(doc: &[u8], scan: &Scan, base: &Url, deferred: &[usize], out: &mut Vec<Edit>) {
    let mut head_seen = false;
    for record in scan.records() {
        match record.kind() {
            RecordKind::Head if !head_seen => {
                head_seen = true;
                let mut pieces = vec![
                    Piece::Static(b"<script>"),
                    Piece::Static(BOOTSTRAP.as_bytes()),
                    Piece::Static(b"</script>"),
                ];
                if scan.base().is_none() {
                    pieces.push(Piece::Static(b"<base target=\"_top\">"));
                }
                out.push(Edit::insert(record.last(), pieces));
            }
            RecordKind::Base => {
                let is_first = scan.base().is_some_and(|b| b.record == record.index());
                if is_first && record.span(field::VALUE2).is_none() {
                    let at = before_tag_end(doc, record.whole());
                    out.push(Edit::insert(at, vec![Piece::Static(b" target=\"_top\"")]));
                }
            }
            RecordKind::AnchorTag => retarget(doc, record.span(field::VALUE2), out),
            RecordKind::Form => retarget(doc, record.span(field::VALUE), out),
            RecordKind::Body => wrap_handler(doc, record.span(field::VALUE), out),
            RecordKind::Event => wrap_handler(doc, Some(record.whole()), out),
            RecordKind::Iframe => {
                if let Some(src) = record.span(field::VALUE) {
                    defer_iframe(doc, src, out);
                }
            }
            RecordKind::Script if deferred.binary_search(&record.index()).is_ok() => {
                if let Some(url) = script_url(doc, &record, base) {
                    let call = format!("<script>hsLoad({})</script>", js_string(url.as_str()));
                    out.push(Edit::replace(record.whole(), vec![Piece::Owned(call.into_bytes())]));
                }
            }
            _ => {}
        }
    }
    if !head_seen {
        tracing::debug!(target: "htmlspeed::assembler", "No <head>, content-first bootstrap skipped");
    }
}

/// Offset of the tag's closing `>` (or `/>`), or its end when unterminated.
fn before_tag_end(doc: &[u8], tag: Span) -> usize {
    let last = tag.last;
    if last == 0 || doc.get(last - 1) != Some(&b'>') {
        return last;
    }
    if last >= 2 && doc.get(last - 2) == Some(&b'/') {
        last - 2
    } else {
        last - 1
    }
}

fn retarget(doc: &[u8], target: Option<Span>, out: &mut Vec<Edit>) {
    let Some(target) = target else {
        return;
    };
    let value = target.slice(doc);
    if value.eq_ignore_ascii_case(b"_self") || value.eq_ignore_ascii_case(b"_parent") {
        out.push(Edit::replace(target, vec![Piece::Static(b"_top")]));
    }
}

fn wrap_handler(doc: &[u8], handler: Option<Span>, out: &mut Vec<Edit>) {
    let Some(handler) = handler.filter(|s| !s.is_empty()) else {
        return;
    };
    if handler.slice(doc).starts_with(HANDLER_OPEN) {
        return;
    }
    out.push(Edit::insert(handler.first, vec![Piece::Static(HANDLER_OPEN)]));
    out.push(Edit::insert(handler.last, vec![Piece::Static(HANDLER_CLOSE)]));
}

/// `src="x"` becomes `src="about:blank" data-hssrc="x"`.
fn defer_iframe(doc: &[u8], src: Span, out: &mut Vec<Edit>) {
    let value = src.slice(doc);
    if value.is_empty() || value.eq_ignore_ascii_case(b"about:blank") {
        return;
    }
    let quote = src
        .first
        .checked_sub(1)
        .and_then(|i| doc.get(i))
        .copied()
        .filter(|q| matches!(q, b'"' | b'\''));
    let mut rewritten = Vec::with_capacity(value.len() + 32);
    rewritten.extend_from_slice(b"about:blank");
    if let Some(q) = quote {
        rewritten.push(q);
    }
    rewritten.extend_from_slice(b" data-hssrc=");
    if let Some(q) = quote {
        rewritten.push(q);
    }
    rewritten.extend_from_slice(value);
    out.push(Edit::replace(src, vec![Piece::Owned(rewritten)]));
}

/// JSON string literal safe inside a `<script>` element.
fn js_string(s: &str) -> String {
    serde_json::to_string(s)
        .unwrap_or_else(|_| format!("\"{}\"", s.replace('"', "%22")))
        .replace("</", "<\\/")
}
