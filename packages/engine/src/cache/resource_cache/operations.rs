//! Cache operations: get, put, remove
//!
//! Lookups try the canonical non-page key first, since most resource kinds
//! live there, then the exact variant key used by pages.

use std::sync::Arc;

use super::core::{CacheState, Entry, ResourceCache};
use super::super::CacheKey;
use super::super::recency::Timing;
use crate::resource::Resource;
use crate::variant::Variant;

impl ResourceCache {
    /// Cached resource for `(variant, url)`, fresh or not.
    ///
    /// A hit moves the resource to the most recently used end.
    pub fn get(&self, variant: Variant, url: &str) -> Option<Arc<Resource>> {
        self.lookup(variant, url, false)
    }

    /// Like [`get`](Self::get) but only while the freshness window is open.
    pub fn get_fresh(&self, variant: Variant, url: &str) -> Option<Arc<Resource>> {
        self.lookup(variant, url, true)
    }

    fn lookup(&self, variant: Variant, url: &str, fresh_only: bool) -> Option<Arc<Resource>> {
        let now = self.clock.now();
        let mut state = self.lock();
        let id = [CacheKey::new(Variant::NON_PAGE, url), CacheKey::new(variant, url)]
            .iter()
            .find_map(|key| state.map.get(key).and_then(Entry::node));
        let Some(id) = id else {
            self.stats.record_miss();
            return None;
        };
        let node = state.list.get_mut(id)?;
        if fresh_only && node.timing.fresh_until <= now {
            self.stats.record_miss();
            return None;
        }
        node.timing.last_used = now;
        let resource = node.resource.clone();
        state.list.touch(id);
        self.stats.record_hit();
        tracing::trace!(target: "htmlspeed::cache", url, variant = %variant, "Cache hit");
        Some(resource)
    }

    /// Store `resource`, fresh from now for its `max_age`.
    ///
    /// Pages are keyed by `variant`, everything else by the non-page slot.
    /// Returns `false` when the resource exceeds the per-resource size limit.
    pub fn put(&self, variant: Variant, url: &str, resource: Arc<Resource>) -> bool {
        let now = self.clock.now();
        let key = CacheKey::canonical(resource.is_page(), variant, url);
        let mut state = self.lock();
        let stored = self.put_locked(&mut state, key, resource, now);
        self.publish_size(&state);
        stored
    }

    pub(crate) fn put_locked(
        &self,
        state: &mut CacheState,
        key: CacheKey,
        resource: Arc<Resource>,
        now: u64,
    ) -> bool {
        let size = resource.size();
        if size > self.limits.max_resource_size {
            tracing::debug!(
                target: "htmlspeed::cache",
                key = %key,
                size,
                "Resource too large to cache"
            );
            return false;
        }
        match state.map.get(&key) {
            Some(Entry::Ready(id)) => {
                let id = *id;
                if state
                    .list
                    .get(id)
                    .is_some_and(|node| Arc::ptr_eq(&node.resource, &resource))
                {
                    if let Some(node) = state.list.get_mut(id) {
                        node.timing = Timing::fresh(now, resource.max_age);
                    }
                    state.list.touch(id);
                    return true;
                }
                state.map.remove(&key);
                state.list.unlink(id);
            }
            Some(Entry::Refreshing(id, placeholder)) => {
                // The in-flight refresh loses; its waiters get what was stored.
                let (id, placeholder) = (*id, placeholder.clone());
                state.map.remove(&key);
                state.list.unlink(id);
                placeholder.settle(super::super::LoadState::Ready(resource.clone()));
            }
            Some(Entry::Loading(placeholder)) => {
                let placeholder = placeholder.clone();
                state.map.remove(&key);
                placeholder.settle(super::super::LoadState::Ready(resource.clone()));
            }
            None => {}
        }
        self.make_room(state, size, now);
        let max_age = resource.max_age;
        let id = state
            .list
            .push_back(key.clone(), resource, Timing::fresh(now, max_age));
        state.map.insert(key, Entry::Ready(id));
        true
    }

    /// Drop the resource at `(variant, url)`, trying the non-page key first.
    pub fn remove(&self, variant: Variant, url: &str) -> Option<Arc<Resource>> {
        let mut state = self.lock();
        let removed = [CacheKey::new(Variant::NON_PAGE, url), CacheKey::new(variant, url)]
            .into_iter()
            .find_map(|key| remove_locked(&mut state, &key));
        self.publish_size(&state);
        removed
    }

    pub(crate) fn publish_size(&self, state: &CacheState) {
        self.stats
            .update_size(state.list.len() as u64, state.list.total_bytes());
    }
}

/// Remove whatever real resource occupies `key`; placeholders stay.
fn remove_locked(state: &mut CacheState, key: &CacheKey) -> Option<Arc<Resource>> {
    let id = match state.map.get(key)? {
        Entry::Ready(id) => {
            let id = *id;
            state.map.remove(key);
            id
        }
        Entry::Refreshing(id, placeholder) => {
            // The refresh still completes into a first-load slot.
            let id = *id;
            let placeholder = placeholder.clone();
            state.map.insert(key.clone(), Entry::Loading(placeholder));
            id
        }
        Entry::Loading(_) => return None,
    };
    state.list.unlink(id).map(|node| node.resource)
}
