//! Resource caching
//!
//! - [`CacheKey`]: `<variant><url-without-scheme>`
//! - [`ResourceCache`]: map + recency list + byte-budget reclaimer
//! - [`Placeholder`] / [`Waiter`] / [`LoadTicket`]: single-flight loading

pub mod cache_key;
pub mod cache_stats;
pub mod placeholder;
pub(crate) mod recency;
pub mod resource_cache;

pub use cache_key::{CacheKey, to_key};
pub use cache_stats::{CacheStats, CacheStatsSnapshot};
pub use placeholder::{LoadState, Placeholder, Waiter};
pub use resource_cache::{InvariantViolation, LoadTicket, Lookup, ResourceCache};
