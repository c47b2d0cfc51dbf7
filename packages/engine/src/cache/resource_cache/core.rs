//! Core ResourceCache structure and initialization
//!
//! All structural state (map, recency list, byte total) sits behind one
//! mutex. The lock is never held across an await: loads happen outside it
//! and come back through [`LoadTicket`](super::LoadTicket).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use super::super::cache_stats::{CacheStats, CacheStatsSnapshot};
use super::super::placeholder::Placeholder;
use super::super::recency::{NodeId, RecencyList};
use super::super::CacheKey;
use crate::clock::Clock;
use crate::config::{CacheLimits, FreshnessPolicy};

/// What occupies a cache key
#[derive(Debug)]
pub(crate) enum Entry {
    Ready(NodeId),
    /// First load in flight
    Loading(Arc<Placeholder>),
    /// Refresh in flight; the old resource stays linked and marked being-loaded
    Refreshing(NodeId, Arc<Placeholder>),
}

impl Entry {
    pub(crate) fn node(&self) -> Option<NodeId> {
        match self {
            Entry::Ready(id) | Entry::Refreshing(id, _) => Some(*id),
            Entry::Loading(_) => None,
        }
    }

    pub(crate) fn placeholder(&self) -> Option<&Arc<Placeholder>> {
        match self {
            Entry::Loading(p) | Entry::Refreshing(_, p) => Some(p),
            Entry::Ready(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct CacheState {
    pub(crate) map: HashMap<CacheKey, Entry>,
    pub(crate) list: RecencyList,
    pub(crate) last_sweep: u64,
}

/// Variant-aware resource cache with single-flight loading
pub struct ResourceCache {
    pub(super) state: Mutex<CacheState>,
    pub(super) limits: CacheLimits,
    pub(super) freshness: FreshnessPolicy,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) stats: CacheStats,
}

/// A broken structural invariant, reported by
/// [`ResourceCache::debug_validate_invariants`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("map entry {key} points at missing node {node}")]
    DanglingNode { key: String, node: usize },
    #[error("node {node} is keyed {node_key} but mapped from {key}")]
    KeyMismatch {
        key: String,
        node: usize,
        node_key: String,
    },
    #[error("recency list holds {list} resources but the map references {map}")]
    MembershipMismatch { list: usize, map: usize },
    #[error("tracked {tracked} bytes but resources hold {actual}")]
    ByteMismatch { tracked: u64, actual: u64 },
}

impl ResourceCache {
    pub fn new(limits: CacheLimits, freshness: FreshnessPolicy, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(CacheState {
                last_sweep: now,
                ..CacheState::default()
            }),
            limits,
            freshness,
            clock,
            stats: CacheStats::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::warn!(target: "htmlspeed::cache", "Recovering poisoned cache lock");
            poisoned.into_inner()
        })
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn limits(&self) -> &CacheLimits {
        &self.limits
    }

    pub fn freshness(&self) -> &FreshnessPolicy {
        &self.freshness
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Resources held (placeholders excluded)
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.lock().list.total_bytes()
    }

    /// Recompute membership and byte totals from scratch.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant found.
    pub fn debug_validate_invariants(&self) -> Result<(), InvariantViolation> {
        let state = self.lock();
        let mut referenced = 0usize;
        let mut actual = 0u64;
        for (key, entry) in &state.map {
            let Some(id) = entry.node() else {
                continue;
            };
            let node = state.list.get(id).ok_or_else(|| InvariantViolation::DanglingNode {
                key: key.to_string(),
                node: id,
            })?;
            if &node.key != key {
                return Err(InvariantViolation::KeyMismatch {
                    key: key.to_string(),
                    node: id,
                    node_key: node.key.to_string(),
                });
            }
            referenced += 1;
            actual += node.resource.size();
        }
        let linked = state.list.ids().len();
        if linked != referenced || state.list.len() != referenced {
            return Err(InvariantViolation::MembershipMismatch {
                list: linked,
                map: referenced,
            });
        }
        if state.list.total_bytes() != actual {
            return Err(InvariantViolation::ByteMismatch {
                tracked: state.list.total_bytes(),
                actual,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("limits", &self.limits)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
