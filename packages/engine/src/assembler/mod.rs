//! Response assembly
//!
//! Turns the original document, its scan and the resolver's decisions into
//! the bytes served to the browser. Edits are collected per record, ordered
//! by start offset and applied in one forward copy; anything between edits
//! is copied verbatim.

pub mod content_first;
pub(crate) mod edits;
mod output;

use bytes::Bytes;
use url::Url;

pub use edits::EditCounts;

use crate::config::DomainConfig;
use crate::error::{self, Result};
use crate::resolver::{Decision, Reference};
use crate::scanner::Scan;
use edits::{Edit, Piece};
use output::OutputSink;

/// Everything one assembly pass reads
#[derive(Debug, Clone, Copy)]
pub struct Assembly<'a> {
    pub doc: &'a [u8],
    pub scan: &'a Scan,
    pub base: &'a Url,
    pub refs: &'a [Reference],
    /// Parallel to `refs`
    pub decisions: &'a [Decision],
    pub domain: &'a DomainConfig,
    /// Also produce a gzip copy at this level
    pub gzip_level: Option<u32>,
}

/// Assembled response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub body: Bytes,
    pub gzip: Option<Bytes>,
    pub counts: EditCounts,
}

impl Assembled {
    /// Uncompressed size, the figure size budgets work from
    #[must_use]
    pub fn uncompressed_len(&self) -> usize {
        self.body.len()
    }
}

/// Assemble the response for one variant.
///
/// # Errors
///
/// Only the gzip encoder can fail.
pub fn assemble(input: &Assembly<'_>) -> Result<Assembled> {
    let doc = input.doc;
    let deferred = content_first::deferred_scripts(doc, input.scan, input.base, input.domain);

    let mut edits: Vec<Edit> = Vec::with_capacity(input.refs.len() + 8);
    let counts = edits::from_decisions(input.refs, input.decisions, &deferred, &mut edits);
    if input.domain.content_first {
        content_first::edits(doc, input.scan, input.base, &deferred, &mut edits);
    }
    edits.sort_by_key(|e| e.first);

    let growth: usize = edits
        .iter()
        .flat_map(|e| &e.pieces)
        .map(|p| match p {
            Piece::Shared(b) | Piece::Escaped { body: b, .. } => b.len(),
            _ => 0,
        })
        .sum();
    let mut sink = OutputSink::new(doc.len() + growth, input.gzip_level);
    apply(doc, &edits, &mut sink).map_err(error::compression)?;

    let (body, gzip) = sink.finish().map_err(error::compression)?;
    tracing::trace!(
        target: "htmlspeed::assembler",
        original = doc.len(),
        assembled = body.len(),
        edits = edits.len(),
        inlined = counts.inlined,
        substituted = counts.substituted,
        "Assembled response"
    );
    Ok(Assembled {
        body: Bytes::from(body),
        gzip: gzip.map(Bytes::from),
        counts,
    })
}

fn apply(doc: &[u8], edits: &[Edit], sink: &mut OutputSink) -> std::io::Result<()> {
    let mut cursor = 0;
    for edit in edits {
        if edit.first < cursor || edit.last > doc.len() || edit.last < edit.first {
            // Nested in an element already replaced.
            tracing::trace!(
                target: "htmlspeed::assembler",
                first = edit.first,
                last = edit.last,
                cursor,
                "Skipping overlapped edit"
            );
            continue;
        }
        sink.write(&doc[cursor..edit.first])?;
        for piece in &edit.pieces {
            match piece {
                Piece::Static(bytes) => sink.write(bytes)?,
                Piece::Shared(bytes) => sink.write(bytes)?,
                Piece::Owned(bytes) => sink.write(bytes)?,
                Piece::Original(span) => sink.write(span.slice(doc))?,
                Piece::Escaped { body, closing } => sink.write_escaped(body, closing)?,
            }
        }
        cursor = edit.last;
    }
    sink.write(&doc[cursor.min(doc.len())..])?;
    Ok(())
}
