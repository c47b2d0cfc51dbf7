//! Single-flight acquisition and refresh
//!
//! [`ResourceCache::acquire`] decides under the cache lock whether the
//! caller may use a cached resource, must wait on another task's load, or
//! has become the loader. The loader's [`LoadTicket`] settles the
//! placeholder exactly once; dropping an unsettled ticket counts as a failed
//! load, so waiters never hang on a loader that went away.

use std::sync::Arc;

use super::core::{Entry, ResourceCache};
use super::super::CacheKey;
use super::super::placeholder::{LoadState, Placeholder, Waiter};
use super::super::recency::Timing;
use crate::resource::Resource;
use crate::variant::Variant;

/// Result of [`ResourceCache::acquire`]
#[derive(Debug)]
pub enum Lookup {
    /// Cached and fresh
    Fresh(Arc<Resource>),
    /// Another task is loading it
    Wait(Waiter),
    /// The caller must load it
    Load(LoadTicket),
}

impl ResourceCache {
    /// Claim `(variant, url)` for use or loading.
    ///
    /// `page` selects the per-variant page key; sub-resources use the
    /// non-page slot. A resource inside its refresh gap is handed out as a
    /// [`Lookup::Load`] whose [`LoadTicket::replacer`] is still usable, so the
    /// refresh runs without blocking the caller.
    pub fn acquire(self: &Arc<Self>, variant: Variant, url: &str, page: bool) -> Lookup {
        let now = self.clock.now();
        let key = CacheKey::canonical(page, variant, url);
        let mut state = self.lock();

        if page {
            // Requests that turn out to be sub-resources are stored non-page.
            let non_page = CacheKey::new(Variant::NON_PAGE, url);
            if let Some(id) = state.map.get(&non_page).and_then(Entry::node) {
                if let Some(node) = state.list.get_mut(id).filter(|n| n.timing.fresh_until > now) {
                    node.timing.last_used = now;
                    let resource = node.resource.clone();
                    state.list.touch(id);
                    self.stats.record_hit();
                    return Lookup::Fresh(resource);
                }
            }
        }

        let lookup = match state.map.get(&key) {
            None => {
                let placeholder = Placeholder::new(None);
                state.map.insert(key.clone(), Entry::Loading(placeholder.clone()));
                self.stats.record_miss();
                self.stats.record_load();
                tracing::trace!(target: "htmlspeed::cache", key = %key, "Loading");
                Lookup::Load(LoadTicket::new(self.clone(), key, variant, url, placeholder))
            }
            Some(Entry::Loading(placeholder)) => {
                self.stats.record_miss();
                Lookup::Wait(placeholder.waiter())
            }
            Some(Entry::Refreshing(id, placeholder)) => {
                let (id, placeholder) = (*id, placeholder.clone());
                match state.list.get_mut(id) {
                    Some(node) if node.timing.fresh_until > now => {
                        node.timing.last_used = now;
                        let resource = node.resource.clone();
                        state.list.touch(id);
                        self.stats.record_hit();
                        Lookup::Fresh(resource)
                    }
                    _ => {
                        self.stats.record_miss();
                        Lookup::Wait(placeholder.waiter())
                    }
                }
            }
            Some(Entry::Ready(id)) => {
                let id = *id;
                let refresh_gap = self.freshness.refresh_gap;
                match state.list.get_mut(id) {
                    Some(node) if node.timing.fresh_until > now.saturating_add(refresh_gap) => {
                        node.timing.last_used = now;
                        let resource = node.resource.clone();
                        state.list.touch(id);
                        self.stats.record_hit();
                        Lookup::Fresh(resource)
                    }
                    Some(node) => {
                        // Swap in a placeholder wrapping the current resource.
                        node.timing.being_loaded = true;
                        node.timing.last_used = now;
                        let placeholder = Placeholder::new(Some(node.resource.clone()));
                        state
                            .map
                            .insert(key.clone(), Entry::Refreshing(id, placeholder.clone()));
                        self.stats.record_refresh();
                        tracing::trace!(target: "htmlspeed::cache", key = %key, "Refreshing");
                        Lookup::Load(LoadTicket::new(self.clone(), key, variant, url, placeholder))
                    }
                    None => {
                        // A map entry without its node; start over as a miss.
                        tracing::warn!(target: "htmlspeed::cache", key = %key, "Dangling cache entry");
                        let placeholder = Placeholder::new(None);
                        state.map.insert(key.clone(), Entry::Loading(placeholder.clone()));
                        self.stats.record_miss();
                        self.stats.record_load();
                        Lookup::Load(LoadTicket::new(self.clone(), key, variant, url, placeholder))
                    }
                }
            }
        };
        lookup
    }

    /// The entry at `key` is still `placeholder`'s.
    fn owns(entry: Option<&Entry>, placeholder: &Arc<Placeholder>) -> bool {
        entry
            .and_then(Entry::placeholder)
            .is_some_and(|p| Arc::ptr_eq(p, placeholder))
    }

    fn finish(&self, ticket: &LoadTicket, outcome: Outcome) {
        let now = self.clock.now();
        let mut state = self.lock();
        let owned = Self::owns(state.map.get(&ticket.key), &ticket.placeholder);
        let node = if owned {
            state.map.remove(&ticket.key).and_then(|entry| entry.node())
        } else {
            None
        };

        let published = match outcome {
            Outcome::Loaded { resource, store } => {
                if let Some(id) = node {
                    state.list.unlink(id);
                }
                if store {
                    let key = CacheKey::canonical(resource.is_page(), ticket.variant, &ticket.url);
                    self.put_locked(&mut state, key, resource.clone(), now);
                    LoadState::Ready(resource)
                } else {
                    LoadState::Private
                }
            }
            Outcome::Revalidated { max_age } => match node {
                Some(id) => {
                    let resource = state.list.get_mut(id).map(|n| {
                        n.timing = Timing::fresh(now, max_age);
                        n.resource.clone()
                    });
                    state.map.insert(ticket.key.clone(), Entry::Ready(id));
                    state.list.touch(id);
                    match resource {
                        Some(resource) => LoadState::Ready(resource),
                        None => LoadState::Failed {
                            communication_failed: false,
                            fallback: None,
                        },
                    }
                }
                None => match ticket.placeholder.replacer() {
                    Some(replacer) => LoadState::Ready(replacer.clone()),
                    None => LoadState::Failed {
                        communication_failed: false,
                        fallback: None,
                    },
                },
            },
            Outcome::Failed {
                communication_failed,
            } => {
                let fallback = match node {
                    Some(id) => {
                        // Roll back: keep serving the old resource for a short while.
                        let rollback = self.freshness.rollback_freshness;
                        let resource = state.list.get_mut(id).map(|n| {
                            n.timing.being_loaded = false;
                            n.timing.fresh_until = now.saturating_add(rollback);
                            n.resource.clone()
                        });
                        state.map.insert(ticket.key.clone(), Entry::Ready(id));
                        self.stats.record_rollback();
                        tracing::warn!(
                            target: "htmlspeed::cache",
                            key = %ticket.key,
                            communication_failed,
                            "Refresh failed, rolled back"
                        );
                        resource
                    }
                    None => {
                        tracing::debug!(
                            target: "htmlspeed::cache",
                            key = %ticket.key,
                            communication_failed,
                            "Load failed"
                        );
                        ticket.placeholder.replacer().cloned()
                    }
                };
                LoadState::Failed {
                    communication_failed,
                    fallback,
                }
            }
        };
        self.publish_size(&state);
        drop(state);
        ticket.placeholder.settle(published);
    }
}

enum Outcome {
    Loaded { resource: Arc<Resource>, store: bool },
    Revalidated { max_age: u64 },
    Failed { communication_failed: bool },
}

/// Exclusive right to load one cache key
pub struct LoadTicket {
    cache: Arc<ResourceCache>,
    key: CacheKey,
    variant: Variant,
    url: String,
    placeholder: Arc<Placeholder>,
    settled: bool,
}

impl LoadTicket {
    fn new(
        cache: Arc<ResourceCache>,
        key: CacheKey,
        variant: Variant,
        url: &str,
        placeholder: Arc<Placeholder>,
    ) -> Self {
        Self {
            cache,
            key,
            variant,
            url: url.to_string(),
            placeholder,
            settled: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Resource being refreshed, `None` for a first load
    pub fn replacer(&self) -> Option<&Arc<Resource>> {
        self.placeholder.replacer()
    }

    /// The replacer, if its freshness window is still open
    pub fn fresh_replacer(&self) -> Option<Arc<Resource>> {
        let replacer = self.replacer()?;
        let now = self.cache.now();
        let state = self.cache.lock();
        let node = state.list.get(state.map.get(&self.key)?.node()?)?;
        (Arc::ptr_eq(&node.resource, replacer) && node.timing.fresh_until > now)
            .then(|| replacer.clone())
    }

    pub fn is_refresh(&self) -> bool {
        self.placeholder.replacer().is_some()
    }

    /// Handle for another task to observe this load.
    pub fn waiter(&self) -> Waiter {
        self.placeholder.waiter()
    }

    /// Publish `resource` to waiters and store it.
    ///
    /// With `store` false (state-full content) nothing is kept and waiters
    /// settle as [`LoadState::Private`]: the resource belongs to this
    /// loader's browser alone.
    pub fn complete(mut self, resource: Arc<Resource>, store: bool) {
        self.settled = true;
        self.cache.finish(&self, Outcome::Loaded { resource, store });
    }

    /// The origin confirmed the replacer is unchanged (`304`).
    pub fn revalidated(mut self, max_age: u64) {
        self.settled = true;
        self.cache.finish(&self, Outcome::Revalidated { max_age });
    }

    /// The load failed; a refresh rolls back to the replacer.
    pub fn fail(mut self, communication_failed: bool) {
        self.settled = true;
        self.cache.finish(&self, Outcome::Failed { communication_failed });
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.settled = true;
            tracing::debug!(target: "htmlspeed::cache", key = %self.key, "Load abandoned");
            self.cache.finish(
                self,
                Outcome::Failed {
                    communication_failed: false,
                },
            );
        }
    }
}

impl std::fmt::Debug for LoadTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTicket")
            .field("key", &self.key)
            .field("refresh", &self.is_refresh())
            .field("settled", &self.settled)
            .finish()
    }
}
