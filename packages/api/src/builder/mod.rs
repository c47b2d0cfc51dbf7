//! HtmlSpeed builder API modules
//!
//! Fluent construction of the accelerator, its domains and the browser
//! requests handed to it.

pub mod core;
pub mod domain;
pub mod request;

pub use core::*;
pub use domain::*;
pub use request::*;
