//! Variant-aware resource cache
//!
//! One mutex guards a key map and an arena recency list with byte
//! accounting. Placeholders make loads single-flight, and refreshes swap a
//! placeholder in front of the old resource so readers are not blocked.

pub mod core;
pub mod eviction;
pub mod load;
pub mod operations;

pub use core::{InvariantViolation, ResourceCache};
pub use load::{LoadTicket, Lookup};
