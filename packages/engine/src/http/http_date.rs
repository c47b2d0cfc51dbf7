//! HTTP date parsing and formatting utilities
//!
//! RFC 7231 dates as whole seconds since the Unix epoch, the unit the cache
//! keeps its freshness windows in.

/// HTTP date parsing error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpDateParseError {
    /// Date format was not recognized by any of the supported parsers
    #[error("Unrecognized HTTP date format: {0}")]
    UnrecognizedFormat(String),
    /// Date was parsed but represents a time before Unix epoch
    #[error("Invalid timestamp in HTTP date: {0}")]
    InvalidTimestamp(String),
}

/// Parse an HTTP date into epoch seconds.
///
/// # Errors
///
/// Returns `HttpDateParseError` when no supported format matches or the date
/// lies before the epoch.
pub fn parse_http_date(date_str: &str) -> Result<u64, HttpDateParseError> {
    use chrono::{DateTime, NaiveDateTime};

    let date_str = date_str.trim();

    // 1. IMF-fixdate (preferred): "Sun, 06 Nov 1994 08:49:37 GMT"
    // 2. RFC 850 format: "Sunday, 06-Nov-94 08:49:37 GMT"
    // 3. ANSI C asctime() format: "Sun Nov  6 08:49:37 1994"
    let timestamp = NaiveDateTime::parse_from_str(date_str, "%a, %d %b %Y %H:%M:%S GMT")
        .or_else(|_| NaiveDateTime::parse_from_str(date_str, "%A, %d-%b-%y %H:%M:%S GMT"))
        .or_else(|_| NaiveDateTime::parse_from_str(date_str, "%a %b %e %H:%M:%S %Y"))
        .map(|dt| dt.and_utc().timestamp())
        .or_else(|_| DateTime::parse_from_rfc2822(date_str).map(|dt| dt.timestamp()))
        .map_err(|_| HttpDateParseError::UnrecognizedFormat(date_str.to_string()))?;

    u64::try_from(timestamp).map_err(|_| HttpDateParseError::InvalidTimestamp(date_str.to_string()))
}

/// Format epoch seconds as an IMF-fixdate.
#[must_use]
pub fn fmt_http_date(secs: u64) -> String {
    use chrono::{DateTime, Utc};

    let dt = i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .unwrap_or_default();

    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imf_fixdate_round_trips() {
        let secs = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").expect("valid date");
        assert_eq!(secs, 784_111_777);
        assert_eq!(fmt_http_date(secs), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn legacy_formats_parse() {
        assert_eq!(
            parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT"),
            Ok(784_111_777)
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_http_date("-1"),
            Err(HttpDateParseError::UnrecognizedFormat(_))
        ));
    }
}
