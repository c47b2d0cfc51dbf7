use std::error::Error as StdError;
use std::fmt;

/// A Result alias where the Err case is `htmlspeed_engine::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the accelerator's I/O-facing paths.
///
/// Scanning and cache bookkeeping never fail; only origin fetches, encoding,
/// configuration and the background worker surface errors.
pub struct Error {
    pub inner: Box<Inner>,
}

pub struct Inner {
    pub kind: Kind,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Origin unreachable or response malformed
    Fetch,
    /// Origin exchange exceeded its deadline
    Timeout,
    /// Origin answered with a non-success status
    Status(u16),
    /// Body or header could not be decoded
    Decode,
    /// Output compression failed
    Compression,
    /// Configuration rejected by validation
    Config,
    /// Cache entry could not be produced
    Cache,
    /// Background worker queue full or gone
    Worker,
}

impl Error {
    pub fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(Inner {
                kind,
                source: None,
                url: None,
            }),
        }
    }

    #[must_use = "Error builder methods return a new Error and should be used"]
    pub fn with<E: Into<Box<dyn StdError + Send + Sync>>>(mut self, source: E) -> Error {
        self.inner.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.inner.url = Some(url.into());
        self
    }

    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    /// Get the URL associated with this error, if any
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.inner.url.as_deref()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("htmlspeed::Error");

        f.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }

        if let Some(ref url) = self.inner.url {
            f.field("url", url);
        }

        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Fetch => f.write_str("origin fetch failed")?,
            Kind::Timeout => f.write_str("origin fetch timed out")?,
            Kind::Status(code) => write!(f, "origin answered with status {code}")?,
            Kind::Decode => f.write_str("error decoding origin response")?,
            Kind::Compression => f.write_str("error compressing response")?,
            Kind::Config => f.write_str("invalid configuration")?,
            Kind::Cache => f.write_str("cache entry unavailable")?,
            Kind::Worker => f.write_str("background worker unavailable")?,
        }

        if let Some(ref url) = self.inner.url {
            write!(f, " for {url}")?;
        }

        if let Some(ref source) = self.inner.source {
            write!(f, ": {source}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|err| &**err as &(dyn StdError + 'static))
    }
}

impl From<crate::config::ConfigurationError> for Error {
    fn from(err: crate::config::ConfigurationError) -> Self {
        Error::new(Kind::Config).with(err)
    }
}

impl From<crate::origin::FetchFailure> for Error {
    fn from(err: crate::origin::FetchFailure) -> Self {
        let kind = if err.is_timeout() {
            Kind::Timeout
        } else {
            Kind::Fetch
        };
        Error::new(kind).with(err)
    }
}
