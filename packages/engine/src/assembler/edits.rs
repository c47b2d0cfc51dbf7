//! Byte-range edits over the original document

use bytes::Bytes;

use crate::resolver::{Decision, RefClass, Reference};
use crate::scanner::Span;

/// One piece of replacement text
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Piece {
    Static(&'static [u8]),
    Shared(Bytes),
    Owned(Vec<u8>),
    /// Copied from the original document
    Original(Span),
    /// Element body; occurrences of `closing` are escaped on the way out
    Escaped { body: Bytes, closing: &'static [u8] },
}

/// Replace `[first, last)` by `pieces`; `first == last` inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub(crate) first: usize,
    pub(crate) last: usize,
    pub(crate) pieces: Vec<Piece>,
}

impl Edit {
    pub(crate) fn replace(span: Span, pieces: Vec<Piece>) -> Self {
        Self {
            first: span.first,
            last: span.last,
            pieces,
        }
    }

    pub(crate) fn insert(at: usize, pieces: Vec<Piece>) -> Self {
        Self {
            first: at,
            last: at,
            pieces,
        }
    }
}

/// Counts of what the decisions turned into
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditCounts {
    pub inlined: usize,
    pub substituted: usize,
}

/// Edits carrying out the resolver's decisions.
///
/// References whose record is in `skip` (sorted) are left alone.
pub(crate) fn from_decisions(
    refs: &[Reference],
    decisions: &[Decision],
    skip: &[usize],
    out: &mut Vec<Edit>,
) -> EditCounts {
    let mut counts = EditCounts::default();
    for (reference, decision) in refs.iter().zip(decisions) {
        if skip.binary_search(&reference.record).is_ok() {
            continue;
        }
        match decision {
            Decision::Leave => {}
            Decision::Substitute(url) => {
                out.push(Edit::replace(
                    reference.url_span,
                    vec![Piece::Owned(url.as_bytes().to_vec())],
                ));
                counts.substituted += 1;
            }
            Decision::Inline(resource) => {
                let edit = match reference.class {
                    RefClass::Image => resource
                        .base64_inline
                        .clone()
                        .map(|uri| Edit::replace(reference.url_span, vec![Piece::Shared(uri)])),
                    RefClass::Script => Some(Edit::replace(
                        reference.whole,
                        vec![
                            Piece::Static(b"<script>"),
                            Piece::Escaped {
                                body: resource.optimized.clone(),
                                closing: b"</script",
                            },
                            Piece::Static(b"</script>"),
                        ],
                    )),
                    RefClass::Stylesheet => {
                        let mut pieces = vec![Piece::Static(b"<style")];
                        if let Some(media) = reference.media.filter(|m| !m.is_empty()) {
                            pieces.push(Piece::Static(b" media=\""));
                            pieces.push(Piece::Original(media));
                            pieces.push(Piece::Static(b"\""));
                        }
                        pieces.push(Piece::Static(b">"));
                        pieces.push(Piece::Escaped {
                            body: resource.optimized.clone(),
                            closing: b"</style",
                        });
                        pieces.push(Piece::Static(b"</style>"));
                        Some(Edit::replace(reference.whole, pieces))
                    }
                };
                if let Some(edit) = edit {
                    out.push(edit);
                    counts.inlined += 1;
                }
            }
        }
    }
    counts
}
