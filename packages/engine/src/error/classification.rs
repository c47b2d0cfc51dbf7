use std::error::Error as StdError;
use std::io;

use super::types::{Error, Kind};
use crate::origin::FetchFailure;

impl Error {
    /// Returns true if the origin could not be reached or answered garbage.
    #[must_use]
    pub fn is_fetch(&self) -> bool {
        matches!(self.inner.kind, Kind::Fetch)
    }

    /// Returns true if the origin answered with a non-success status.
    #[must_use]
    pub fn is_status(&self) -> bool {
        matches!(self.inner.kind, Kind::Status(_))
    }

    /// Returns true if the error is related to a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        if matches!(self.inner.kind, Kind::Timeout) {
            return true;
        }

        let mut source = self.source();

        while let Some(err) = source {
            if let Some(failure) = err.downcast_ref::<FetchFailure>()
                && failure.is_timeout()
            {
                return true;
            }
            if let Some(io) = err.downcast_ref::<io::Error>()
                && io.kind() == io::ErrorKind::TimedOut
            {
                return true;
            }
            source = err.source();
        }

        false
    }

    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self.inner.kind, Kind::Config)
    }

    /// Returns the origin status code, if the error was generated from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self.inner.kind {
            Kind::Status(code) => Some(code),
            _ => None,
        }
    }

    /// Status the browser-facing layer should answer with when no cached
    /// fallback exists.
    #[must_use]
    pub fn status_hint(&self) -> http::StatusCode {
        if self.is_timeout() {
            return http::StatusCode::GATEWAY_TIMEOUT;
        }
        match self.inner.kind {
            Kind::Status(code) => {
                http::StatusCode::from_u16(code).unwrap_or(http::StatusCode::BAD_GATEWAY)
            }
            Kind::Fetch | Kind::Decode => http::StatusCode::BAD_GATEWAY,
            _ => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_detected_through_sources() {
        let err = crate::error::fetch(FetchFailure::Timeout);
        assert!(err.is_timeout());
        assert_eq!(err.status_hint(), http::StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn status_errors_keep_the_origin_code() {
        let err = crate::error::status("http://a.com/x", http::StatusCode::NOT_FOUND);
        assert!(err.is_status());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.url(), Some("http://a.com/x"));
        assert_eq!(err.status_hint(), http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn connect_failures_map_to_bad_gateway() {
        let err: Error = FetchFailure::Connect("refused".into()).into();
        assert!(err.is_fetch());
        assert!(!err.is_timeout());
        assert_eq!(err.status_hint(), http::StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("refused"));
    }
}
