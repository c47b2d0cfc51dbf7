//! Gzip and deflate for origin bodies and served copies
//!
//! Origin bodies arrive gzip/deflate encoded on demand and are decoded
//! before scanning. Text resources keep a pre-compressed gzip copy next to
//! the plain one when compression pays off.

use std::fmt;
use std::io::{self, Read, Write};

use flate2::{
    Compression as FlateCompression,
    read::{DeflateDecoder, GzDecoder, ZlibDecoder},
    write::GzEncoder,
};

/// Bodies shorter than this are never compressed
pub const MIN_COMPRESS_LEN: usize = 64;

/// Minimum compression ratio to be considered worthwhile (1.05 = 5% improvement)
const MIN_COMPRESSION_RATIO_PERCENT: usize = 105;

/// Upper bound on a decoded body (decompression bombs)
const MAX_DECODED_SIZE: u64 = 64 * 1024 * 1024;

/// Content-Encoding of a stored or fetched body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    #[must_use]
    pub fn encoding_name(self) -> &'static str {
        match self {
            ContentEncoding::Identity => "identity",
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Deflate => "deflate",
        }
    }

    /// Parse a `Content-Encoding` value; `None` for encodings we cannot decode.
    #[must_use]
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Some(ContentEncoding::Gzip),
            "deflate" => Some(ContentEncoding::Deflate),
            "identity" | "" => Some(ContentEncoding::Identity),
            _ => None,
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoding_name())
    }
}

/// Gzip `data` at `level` (0-9).
///
/// # Errors
///
/// Propagates the encoder's I/O error.
pub fn gzip(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(data.len() / 2 + 32),
        FlateCompression::new(level.min(9)),
    );
    encoder.write_all(data)?;
    encoder.finish()
}

/// Gzip `data` when it is long enough and shrinks by at least 5%.
///
/// Returns `None` when compression is skipped, not worthwhile or fails.
#[must_use]
pub fn gzip_if_worthwhile(data: &[u8], level: u32) -> Option<Vec<u8>> {
    if data.len() < MIN_COMPRESS_LEN {
        return None;
    }
    match gzip(data, level) {
        Ok(compressed) if is_worthwhile(data.len(), compressed.len()) => {
            tracing::trace!(
                target: "htmlspeed::compression",
                original_size = data.len(),
                compressed_size = compressed.len(),
                "Compression completed"
            );
            Some(compressed)
        }
        Ok(compressed) => {
            tracing::trace!(
                target: "htmlspeed::compression",
                original_size = data.len(),
                compressed_size = compressed.len(),
                "Compression ratio insufficient, keeping plain copy only"
            );
            None
        }
        Err(e) => {
            tracing::warn!(target: "htmlspeed::compression", error = %e, "Compression failed");
            None
        }
    }
}

/// `compressed` saves at least 5% over `original`.
#[must_use]
pub fn is_worthwhile(original: usize, compressed: usize) -> bool {
    original >= MIN_COMPRESS_LEN
        && compressed
        .checked_mul(MIN_COMPRESSION_RATIO_PERCENT)
        .is_some_and(|scaled| original.saturating_mul(100) >= scaled)
}

/// Decode a body received with `encoding`.
///
/// # Errors
///
/// Returns an `InvalidData` error for corrupt input or a decoded size beyond
/// the safety limit.
pub fn decompress(data: &[u8], encoding: ContentEncoding) -> io::Result<Vec<u8>> {
    match encoding {
        ContentEncoding::Identity => Ok(data.to_vec()),
        ContentEncoding::Gzip => read_bounded(GzDecoder::new(data), data.len()),
        ContentEncoding::Deflate => {
            // Servers disagree on whether "deflate" means zlib-wrapped or raw.
            if looks_like_zlib(data) {
                read_bounded(ZlibDecoder::new(data), data.len())
            } else {
                read_bounded(DeflateDecoder::new(data), data.len())
            }
        }
    }
}

fn looks_like_zlib(data: &[u8]) -> bool {
    data.len() >= 2
        && data[0] & 0x0f == 8
        && (u16::from(data[0]) << 8 | u16::from(data[1])) % 31 == 0
}

fn read_bounded<R: Read>(reader: R, hint: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(hint.saturating_mul(3));
    let read = reader.take(MAX_DECODED_SIZE + 1).read_to_end(&mut out)?;
    if read as u64 > MAX_DECODED_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "decoded body exceeds size limit",
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trip() {
        let body = b"body { color: red } ".repeat(20);
        let compressed = gzip(&body, 6).expect("gzip");
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
        assert_eq!(decompress(&compressed, ContentEncoding::Gzip).expect("gunzip"), body);
    }

    #[test]
    fn short_bodies_are_not_compressed() {
        assert!(gzip_if_worthwhile(b"tiny", 6).is_none());
        assert!(gzip_if_worthwhile(&b"a".repeat(500), 6).is_some());
    }

    #[test]
    fn deflate_accepts_zlib_and_raw() {
        let body = b"function f() { return 1; }".repeat(10);

        let mut zlib = flate2::write::ZlibEncoder::new(Vec::new(), FlateCompression::default());
        zlib.write_all(&body).unwrap();
        let zlib = zlib.finish().unwrap();
        assert_eq!(decompress(&zlib, ContentEncoding::Deflate).unwrap(), body);

        let mut raw = flate2::write::DeflateEncoder::new(Vec::new(), FlateCompression::default());
        raw.write_all(&body).unwrap();
        let raw = raw.finish().unwrap();
        assert_eq!(decompress(&raw, ContentEncoding::Deflate).unwrap(), body);
    }

    #[test]
    fn corrupt_gzip_is_an_error() {
        assert!(decompress(b"\x1f\x8bnot gzip at all", ContentEncoding::Gzip).is_err());
    }

    #[test]
    fn encoding_names() {
        assert_eq!(ContentEncoding::from_header("X-GZIP"), Some(ContentEncoding::Gzip));
        assert_eq!(ContentEncoding::from_header("br"), None);
        assert_eq!(ContentEncoding::Deflate.to_string(), "deflate");
    }
}
