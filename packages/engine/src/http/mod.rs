//! HTTP plumbing shared by the loader and the request path

pub mod compression;
pub mod headers;
pub mod http_date;
pub mod url;

pub use compression::{ContentEncoding, decompress, gzip, gzip_if_worthwhile};
pub use headers::{
    CacheControl, HeaderError, forward_request_headers, header_lossy, header_str, is_state_full, mime_type,
};
pub use http_date::{HttpDateParseError, fmt_http_date, parse_http_date};
