use super::BoxError;
use super::types::{Error, Kind};

/// Creates an `Error` for an origin fetch failure.
pub fn fetch<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Fetch).with(e.into())
}

/// Creates an `Error` for an origin exchange that exceeded its deadline.
pub fn timeout<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Timeout).with(e.into())
}

/// Creates an `Error` for a non-success origin status.
pub fn status(url: impl Into<String>, code: http::StatusCode) -> Error {
    Error::new(Kind::Status(code.as_u16())).with_url(url)
}

/// Creates an `Error` for a body that could not be decoded.
pub fn decode<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Decode).with(e.into())
}

/// Creates an `Error` for a failed compression pass.
pub fn compression<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Compression).with(e.into())
}

/// Creates an `Error` for a rejected configuration.
pub fn configuration<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Config).with(e.into())
}

pub fn cache<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Cache).with(e.into())
}

pub fn worker<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Worker).with(e.into())
}
