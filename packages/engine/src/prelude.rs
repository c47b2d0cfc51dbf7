//! HtmlSpeed prelude
//!
//! The types an embedding server needs to run the accelerator.

// Request handling
pub use crate::accelerator::{
    Accelerator, Collaborators, PageRequest, Resolution, Served, ServedFrom,
};

// Configuration
pub use crate::config::{
    AcceleratorConfig, CacheLimits, DomainConfig, DomainSpec, FreshnessPolicy, InlineThresholds,
    Registry, TimeoutConfig,
};

// Collaborators supplied by the server
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::origin::{
    CdnLookup, CdnUrls, FetchFailure, HealthTracker, HostHealth, ImageOptimizer, NoCdn,
    OriginFetch, OriginRequest, OriginResponse, PassThroughImages,
};

// Cached content
pub use crate::cache::CacheStatsSnapshot;
pub use crate::resource::{Resource, ResourceKind};
pub use crate::variant::{BrowserClass, Variant, Visit};

// Errors
pub use crate::error::{Error, Result};

// HTTP standard types from http crate
pub use ::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
