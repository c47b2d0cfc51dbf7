//! Cache eviction and cleanup operations
//!
//! Reclamation works from the least recently used end in tiers, largest
//! resources first, and never touches a resource whose refresh is in flight.

use super::core::{CacheState, Entry, ResourceCache};
use super::super::recency::NodeId;

/// Passes over the LRU window per `make_room` call
const MAX_PASSES: usize = 4;
/// Below this many entries a pass scans the whole list
const SMALL_CACHE_ENTRIES: usize = 1000;

impl ResourceCache {
    /// Ensure `incoming` more bytes fit under the total size limit.
    ///
    /// Runs the stale sweep first when a sweep interval has elapsed. When
    /// over the limit, evicts until the total drops to the lower limit.
    pub(crate) fn make_room(&self, state: &mut CacheState, incoming: u64, now: u64) -> usize {
        let mut evicted = 0;
        if now >= state.last_sweep.saturating_add(self.limits.sweep_interval_secs) {
            evicted += self.sweep_locked(state, now);
        }

        let max = self.limits.max_total_size;
        if state.list.total_bytes().saturating_add(incoming) <= max {
            return evicted;
        }
        let lower = self.limits.lower_total_size;
        let fits = |state: &CacheState| state.list.total_bytes().saturating_add(incoming) <= lower;
        let tiers = [
            self.limits.large_entry_size,
            self.limits.medium_entry_size,
            self.limits.small_entry_size,
            0,
        ];

        'passes: for _ in 0..MAX_PASSES {
            let len = state.list.len();
            if len == 0 {
                break;
            }
            let window = if len < SMALL_CACHE_ENTRIES {
                len
            } else {
                (len / 4).max(1)
            };
            let candidates = state.list.oldest(window);
            let before = evicted;
            for threshold in tiers {
                for &id in &candidates {
                    let eligible = state
                        .list
                        .get(id)
                        .is_some_and(|node| {
                            !node.timing.being_loaded && (threshold == 0 || node.size > threshold)
                        });
                    if eligible && evict_node(state, id) {
                        evicted += 1;
                        if fits(state) {
                            break 'passes;
                        }
                    }
                }
            }
            if evicted == before {
                // Everything in the window is being loaded.
                break;
            }
        }

        if evicted > 0 {
            self.stats.evictions.fetch_add(evicted as u64, std::sync::atomic::Ordering::Relaxed);
            tracing::debug!(
                target: "htmlspeed::cache::eviction",
                evicted,
                incoming,
                total_bytes = state.list.total_bytes(),
                "Made room"
            );
        }
        evicted
    }

    /// Evict every resource unused for the configured stale period.
    pub fn sweep_stale(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        let evicted = self.sweep_locked(&mut state, now);
        self.stats
            .evictions
            .fetch_add(evicted as u64, std::sync::atomic::Ordering::Relaxed);
        self.publish_size(&state);
        evicted
    }

    fn sweep_locked(&self, state: &mut CacheState, now: u64) -> usize {
        state.last_sweep = now;
        let cutoff = now.saturating_sub(self.limits.stale_after_secs);
        let stale: Vec<NodeId> = state
            .list
            .ids()
            .into_iter()
            .filter(|&id| {
                state
                    .list
                    .get(id)
                    .is_some_and(|n| !n.timing.being_loaded && n.timing.last_used < cutoff)
            })
            .collect();
        let evicted = stale.into_iter().filter(|&id| evict_node(state, id)).count();
        if evicted > 0 {
            tracing::debug!(
                target: "htmlspeed::cache::eviction",
                evicted,
                remaining = state.list.len(),
                "Swept stale resources"
            );
        }
        evicted
    }
}

/// Unlink `id` and drop its map entry.
fn evict_node(state: &mut CacheState, id: NodeId) -> bool {
    let Some(node) = state.list.unlink(id) else {
        return false;
    };
    if matches!(state.map.get(&node.key), Some(Entry::Ready(mapped)) if *mapped == id) {
        state.map.remove(&node.key);
    }
    tracing::trace!(
        target: "htmlspeed::cache::eviction",
        key = %node.key,
        size = node.size,
        "Evicted"
    );
    true
}
