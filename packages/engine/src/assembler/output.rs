//! Output buffer with an optional gzip twin

use std::io::{self, Write};

use flate2::Compression as FlateCompression;
use flate2::write::GzEncoder;

use crate::scanner::matcher::find_ci;

/// Plain output, written through to a gzip encoder when one is attached
pub(crate) struct OutputSink {
    plain: Vec<u8>,
    gzip: Option<GzEncoder<Vec<u8>>>,
}

impl OutputSink {
    pub(crate) fn new(capacity: usize, gzip_level: Option<u32>) -> Self {
        Self {
            plain: Vec::with_capacity(capacity),
            gzip: gzip_level.map(|level| {
                GzEncoder::new(
                    Vec::with_capacity(capacity / 3 + 32),
                    FlateCompression::new(level.min(9)),
                )
            }),
        }
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.plain.extend_from_slice(bytes);
        if let Some(gzip) = self.gzip.as_mut() {
            gzip.write_all(bytes)?;
        }
        Ok(())
    }

    /// Write `bytes` with every `closing` tag opener (`</script`,
    /// `</style`) turned into `<\/...` so it cannot end the element early.
    pub(crate) fn write_escaped(&mut self, bytes: &[u8], closing: &[u8]) -> io::Result<()> {
        let mut from = 0;
        while let Some(at) = find_ci(bytes, from, closing) {
            self.write(&bytes[from..at + 1])?;
            self.write(b"\\")?;
            from = at + 1;
        }
        self.write(&bytes[from..])
    }

    /// Uncompressed bytes written so far
    pub(crate) fn len(&self) -> usize {
        self.plain.len()
    }

    pub(crate) fn finish(self) -> io::Result<(Vec<u8>, Option<Vec<u8>>)> {
        let gzip = self.gzip.map(GzEncoder::finish).transpose()?;
        Ok((self.plain, gzip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ContentEncoding, decompress};

    #[test]
    fn gzip_twin_matches_plain_output() {
        let mut sink = OutputSink::new(64, Some(6));
        sink.write(b"<html>").unwrap();
        sink.write(&[b'x'; 200]).unwrap();
        sink.write(b"</html>").unwrap();
        assert_eq!(sink.len(), 213);
        let (plain, gzip) = sink.finish().unwrap();
        let inflated = decompress(&gzip.unwrap(), ContentEncoding::Gzip).unwrap();
        assert_eq!(inflated, plain);
    }

    #[test]
    fn closing_tags_are_escaped() {
        let mut sink = OutputSink::new(64, None);
        sink.write_escaped(b"a='</SCRIPT>';b='</script'", b"</script")
            .unwrap();
        let (plain, gzip) = sink.finish().unwrap();
        assert!(gzip.is_none());
        assert_eq!(plain, b"a='<\\/SCRIPT>';b='<\\/script'");
    }
}
