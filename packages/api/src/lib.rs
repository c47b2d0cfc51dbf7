//! HtmlSpeed Public API
//!
//! Fluent construction of an [`Accelerator`] and of the browser requests it
//! serves. The engine itself lives in `htmlspeed_engine`; everything an
//! embedding server needs is re-exported here.
//!
//! ```no_run
//! use std::sync::Arc;
//! use htmlspeed::{HtmlSpeed, DomainBuilder};
//! # async fn run(origin: Arc<dyn htmlspeed::OriginFetch>) -> htmlspeed::Result<()> {
//! let accelerator = HtmlSpeed::builder(origin)
//!     .domain(DomainBuilder::new("www.example.com").version_urls())
//!     .build()?;
//! let served = accelerator
//!     .serve(&HtmlSpeed::request("http://www.example.com/").accept_gzip().build())
//!     .await?;
//! # let _ = served;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use std::sync::Arc;

pub mod builder;

// Re-export all public API components
pub use builder::*;

// Engine types end users work with
pub use htmlspeed_engine::prelude::*;

/// Main HtmlSpeed entry point providing static builder methods
pub struct HtmlSpeed;

impl HtmlSpeed {
    /// Start configuring an accelerator in front of `origin`.
    pub fn builder(origin: Arc<dyn OriginFetch>) -> AcceleratorBuilder {
        AcceleratorBuilder::new(origin)
    }

    /// Start describing a browser request for `url`.
    pub fn request(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(url)
    }
}

/// Shorthand for [`HtmlSpeed::builder`]
pub fn builder(origin: Arc<dyn OriginFetch>) -> AcceleratorBuilder {
    AcceleratorBuilder::new(origin)
}
