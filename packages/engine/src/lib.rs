//! # HtmlSpeed engine
//!
//! Reverse-proxy page accelerator core. Pages are rewritten so the
//! resources they reference arrive with the page itself: small images as
//! data URIs, scripts and stylesheets as inline blocks, everything else
//! pointed at long-lived version URLs or a CDN.
//!
//! ## Features
//!
//! - **Single-pass byte scanner** for HTML and CSS that tolerates malformed markup
//! - **Variant-aware resource cache** with single-flight loading, background
//!   refresh, rollback on failed refresh and byte-budget eviction
//! - **Visit progression**: each repeat visit inlines less, since the browser
//!   cache already holds more
//! - **Budget-based inlining** by size bucket and resource kind
//! - **Content-first pages** with deferred scripts and iframes
//! - **Oversized page downgrade** remembered per URL
//! - **gzip** negotiated per request, precomputed per resource
//!
//! The engine never speaks HTTP itself; the embedding server supplies an
//! [`OriginFetch`](origin::OriginFetch) and hands browser requests to
//! [`Accelerator::serve`].

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod accelerator;
pub mod assembler;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod origin;
pub mod resolver;
pub mod resource;
pub mod scanner;
pub mod variant;

pub mod prelude;

pub use accelerator::{Accelerator, Collaborators, PageRequest, Resolution, Served, ServedFrom};
pub use error::{Error, Result};
