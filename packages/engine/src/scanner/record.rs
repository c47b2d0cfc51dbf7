//! Flat scan record layout
//!
//! A record is its kind code followed by that kind's fixed fields. Offsets
//! are byte positions into the scanned document; a value span whose first
//! offset is negative is an absent attribute.

use std::fmt;

/// Kind code heading every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RecordKind {
    Script = 1,
    Link = 2,
    StyleStart = 3,
    CssImage = 4,
    StyleEnd = 5,
    Img = 6,
    Frame = 7,
    Iframe = 8,
    Head = 9,
    Body = 10,
    AnchorTag = 11,
    Input = 12,
    Event = 13,
    Form = 14,
    Base = 15,
    Meta = 16,
    Eof = 17,
}

impl RecordKind {
    const ALL: [RecordKind; 17] = [
        RecordKind::Script,
        RecordKind::Link,
        RecordKind::StyleStart,
        RecordKind::CssImage,
        RecordKind::StyleEnd,
        RecordKind::Img,
        RecordKind::Frame,
        RecordKind::Iframe,
        RecordKind::Head,
        RecordKind::Body,
        RecordKind::AnchorTag,
        RecordKind::Input,
        RecordKind::Event,
        RecordKind::Form,
        RecordKind::Base,
        RecordKind::Meta,
        RecordKind::Eof,
    ];

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code - 1)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Number of fields after the kind code
    #[must_use]
    pub const fn field_count(self) -> usize {
        match self {
            RecordKind::Script | RecordKind::Link => 10,
            RecordKind::Input => 7,
            RecordKind::AnchorTag | RecordKind::Base | RecordKind::Meta => 6,
            RecordKind::Img => 5,
            RecordKind::StyleStart
            | RecordKind::Frame
            | RecordKind::Iframe
            | RecordKind::Body
            | RecordKind::Form => 4,
            RecordKind::CssImage | RecordKind::Event => 3,
            RecordKind::StyleEnd | RecordKind::Head => 2,
            RecordKind::Eof => 1,
        }
    }

    /// Field index of the duplicate-tracking field
    #[must_use]
    pub const fn dup_field(self) -> Option<usize> {
        match self {
            RecordKind::Script | RecordKind::Link => Some(field::DUP),
            RecordKind::CssImage => Some(2),
            RecordKind::Img => Some(4),
            RecordKind::Input => Some(6),
            _ => None,
        }
    }

    /// Field index of the URL-bearing value span
    #[must_use]
    pub const fn url_field(self) -> Option<usize> {
        match self {
            RecordKind::Script => Some(field::SCRIPT_SRC),
            RecordKind::CssImage => Some(field::FIRST),
            RecordKind::Link
            | RecordKind::Img
            | RecordKind::Input
            | RecordKind::Frame
            | RecordKind::Iframe
            | RecordKind::AnchorTag
            | RecordKind::Base => Some(field::VALUE),
            _ => None,
        }
    }
}

/// Field positions shared across kinds
pub mod field {
    pub const FIRST: usize = 0;
    pub const LAST: usize = 1;
    /// First attribute span of most element kinds (src / href / onload / target / http-equiv)
    pub const VALUE: usize = 2;
    /// Second attribute span (rel / type / target / content)
    pub const VALUE2: usize = 4;
    /// Third attribute span of links (media)
    pub const VALUE3: usize = 6;

    pub const SCRIPT_OPEN_LAST: usize = 1;
    pub const SCRIPT_CLOSE_FIRST: usize = 2;
    pub const SCRIPT_LAST: usize = 3;
    pub const SCRIPT_SRC: usize = 4;
    pub const SCRIPT_TYPE: usize = 6;

    /// Script and link
    pub const IN_IE_COMMENT: usize = 8;
    pub const DUP: usize = 9;

    pub const EVENT_NAME_FIRST: usize = 2;
}

/// Half-open byte range `[first, last)` of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub first: usize,
    pub last: usize,
}

impl Span {
    #[must_use]
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.last.saturating_sub(self.first)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn slice<'a>(&self, doc: &'a [u8]) -> &'a [u8] {
        doc.get(self.first..self.last).unwrap_or_default()
    }

    pub(crate) fn fields(span: Option<Span>) -> [i32; 2] {
        match span {
            Some(s) => [offset(s.first), offset(s.last)],
            None => [-1, -1],
        }
    }
}

pub(crate) fn offset(pos: usize) -> i32 {
    i32::try_from(pos).unwrap_or(i32::MAX)
}

/// Decoded duplicate-tracking field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dup {
    Unique,
    /// First occurrence of a URL referenced `further` more times
    First { further: usize },
    /// Later occurrence; the first one is the record at `first_index`
    Repeat { first_index: usize },
}

impl Dup {
    fn decode(value: i32, repeats_record_zero: bool) -> Self {
        match value {
            0 if repeats_record_zero => Dup::Repeat { first_index: 0 },
            0 => Dup::Unique,
            v if v < 0 => Dup::First {
                further: v.unsigned_abs() as usize,
            },
            v => Dup::Repeat {
                first_index: v as usize,
            },
        }
    }
}

/// Borrowed view of one record
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    index: usize,
    kind: RecordKind,
    fields: &'a [i32],
    repeats_record_zero: bool,
}

impl<'a> Record<'a> {
    /// Position of the kind code in the record array
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    #[must_use]
    pub fn fields(&self) -> &'a [i32] {
        self.fields
    }

    #[must_use]
    pub fn field(&self, i: usize) -> i32 {
        self.fields.get(i).copied().unwrap_or(-1)
    }

    #[must_use]
    pub fn first(&self) -> usize {
        usize::try_from(self.field(field::FIRST)).unwrap_or(0)
    }

    /// End of the whole construct (past the closing tag for scripts)
    #[must_use]
    pub fn last(&self) -> usize {
        let i = if self.kind == RecordKind::Script {
            field::SCRIPT_LAST
        } else {
            field::LAST
        };
        usize::try_from(self.field(i)).unwrap_or(0)
    }

    #[must_use]
    pub fn whole(&self) -> Span {
        Span::new(self.first(), self.last())
    }

    /// Value span starting at field `i`, `None` when absent.
    #[must_use]
    pub fn span(&self, i: usize) -> Option<Span> {
        let first = usize::try_from(self.field(i)).ok()?;
        let last = usize::try_from(self.field(i + 1)).ok()?;
        Some(Span::new(first, last))
    }

    /// The referenced URL's value span
    #[must_use]
    pub fn url_span(&self) -> Option<Span> {
        self.kind.url_field().and_then(|i| self.span(i))
    }

    #[must_use]
    pub fn dup(&self) -> Dup {
        self.kind
            .dup_field()
            .map_or(Dup::Unique, |i| {
                Dup::decode(self.field(i), self.repeats_record_zero)
            })
    }

    #[must_use]
    pub fn in_ie_comment(&self) -> bool {
        matches!(self.kind, RecordKind::Script | RecordKind::Link)
            && self.field(field::IN_IE_COMMENT) != 0
    }
}

impl fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .finish()
    }
}

/// The scan record array
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Records {
    data: Vec<i32>,
    /// Records repeating the URL of the record at index 0, whose dup field
    /// (`0`) would otherwise read as unique. Ascending.
    record_zero_repeats: Vec<usize>,
}

impl Records {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            record_zero_repeats: Vec::new(),
        }
    }

    pub(crate) fn mark_record_zero_repeat(&mut self, index: usize) {
        self.record_zero_repeats.push(index);
    }

    /// Append a record and return its index.
    pub(crate) fn push(&mut self, kind: RecordKind, fields: &[i32]) -> usize {
        debug_assert_eq!(fields.len(), kind.field_count());
        let index = self.data.len();
        self.data.push(kind.code());
        self.data.extend_from_slice(fields);
        index
    }

    pub(crate) fn adjust(&mut self, slot: usize, delta: i32) {
        if let Some(v) = self.data.get_mut(slot) {
            *v += delta;
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Record<'_>> {
        let kind = RecordKind::from_code(*self.data.get(index)?)?;
        let fields = self.data.get(index + 1..index + 1 + kind.field_count())?;
        Some(Record {
            index,
            kind,
            fields,
            repeats_record_zero: self.record_zero_repeats.binary_search(&index).is_ok(),
        })
    }

    #[must_use]
    pub fn iter(&self) -> RecordIter<'_> {
        RecordIter {
            records: self,
            pos: 0,
        }
    }

    /// Records before the terminating EOF
    #[must_use]
    pub fn count(&self) -> usize {
        self.iter().filter(|r| r.kind() != RecordKind::Eof).count()
    }
}

impl<'a> IntoIterator for &'a Records {
    type Item = Record<'a>;
    type IntoIter = RecordIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct RecordIter<'a> {
    records: &'a Records,
    pos: usize,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.get(self.pos)?;
        self.pos += 1 + record.kind.field_count();
        Some(record)
    }
}
