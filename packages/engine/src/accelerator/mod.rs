//! The request-facing accelerator
//!
//! [`Accelerator`] ties the pieces together: it picks the visit variant for
//! a request, answers from the cache when it can, and otherwise fetches,
//! compiles and stores the page under single-flight so concurrent browsers
//! share one origin exchange.

mod compile;
pub mod request;
mod serve;

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use http::HeaderMap;
use url::Url;

pub use request::{PageRequest, Resolution, Served, ServedFrom};

use crate::cache::{CacheStatsSnapshot, ResourceCache};
use crate::clock::{Clock, SystemClock};
use crate::config::Registry;
use crate::error::{self, Result};
use crate::http::mime_type;
use crate::http::url::strip_version;
use crate::origin::{
    CdnLookup, HealthTracker, HostHealth, ImageOptimizer, NoCdn, OriginFetch, PassThroughImages,
};
use crate::resolver::loader::Loader;
use crate::resolver::{Context, Resolver, Worker};
use crate::resource::{Resource, ResourceKind};
use crate::variant::Variant;

/// External services the accelerator works through
#[derive(Clone)]
pub struct Collaborators {
    pub origin: Arc<dyn OriginFetch>,
    pub images: Arc<dyn ImageOptimizer>,
    pub cdn: Arc<dyn CdnLookup>,
    /// Defaults to a [`HostHealth`] using the configured failure threshold
    pub health: Option<Arc<dyn HealthTracker>>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// `origin` with pass-through images, no CDN and the system clock.
    pub fn new(origin: Arc<dyn OriginFetch>) -> Self {
        Self {
            origin,
            images: Arc::new(PassThroughImages),
            cdn: Arc::new(NoCdn),
            health: None,
            clock: Arc::new(SystemClock),
        }
    }
}

struct Inner {
    resolver: Resolver,
    /// Visit offsets of pages too large to inline fully on a first visit
    downgrades: DashMap<String, u8>,
}

/// Reverse-proxy page accelerator; cheap to clone
#[derive(Clone)]
pub struct Accelerator {
    inner: Arc<Inner>,
}

impl Accelerator {
    /// Build the cache and start the background worker.
    ///
    /// # Errors
    ///
    /// Fails outside a Tokio runtime, which the worker needs.
    pub fn new(registry: Arc<Registry>, collaborators: Collaborators) -> Result<Self> {
        tokio::runtime::Handle::try_current().map_err(error::worker)?;
        let config = registry.config();
        let Collaborators {
            origin,
            images,
            cdn,
            health,
            clock,
        } = collaborators;
        let health = health.unwrap_or_else(|| {
            Arc::new(HostHealth::new(config.unhealthy_after_failures)) as Arc<dyn HealthTracker>
        });
        let cache = Arc::new(ResourceCache::new(
            config.cache.clone(),
            config.freshness.clone(),
            clock.clone(),
        ));
        let ctx = Context {
            registry,
            cache,
            origin,
            images,
            cdn,
            health,
            clock,
        };
        let (worker, _task) = Worker::spawn(Loader::new(ctx.clone()), config.worker_queue_capacity);
        tracing::debug!(
            target: "htmlspeed::accelerator",
            max_total_size = config.cache.max_total_size,
            worker_queue_capacity = config.worker_queue_capacity,
            "Accelerator started"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                resolver: Resolver::new(ctx, worker),
                downgrades: DashMap::new(),
            }),
        })
    }

    fn ctx(&self) -> &Context {
        self.inner.resolver.context()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.ctx().registry
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.ctx().cache
    }

    /// Look `url` up for `variant` without touching the origin.
    ///
    /// Version URLs resolve to the resource whose digest they carry.
    #[must_use]
    pub fn resolve(&self, url: &str, variant: Variant, etag: Option<&str>) -> Resolution {
        let cache = self.cache();
        if let Some((plain, token)) = strip_version(url) {
            return match cache.get(Variant::NON_PAGE, &plain) {
                Some(resource) if resource.digest == token => Resolution::Hit(resource),
                _ => Resolution::Miss,
            };
        }
        match cache.get_fresh(variant, url) {
            Some(resource) if etag.is_some() && resource.etag.as_deref() == etag => {
                Resolution::NotModified(resource)
            }
            Some(resource) => Resolution::Hit(resource),
            None => Resolution::Miss,
        }
    }

    /// Build the resource for an origin response and store it.
    ///
    /// Pages are compiled for `variant`; state-full resources are returned
    /// but not cached.
    ///
    /// # Errors
    ///
    /// An unparseable `url`, or a failed compression while assembling.
    pub async fn ingest(
        &self,
        url: &str,
        variant: Variant,
        raw: Bytes,
        headers: &HeaderMap,
    ) -> Result<Arc<Resource>> {
        let parsed = Url::parse(url).map_err(|e| error::decode(e).with_url(url))?;
        let resource = Arc::new(self.build(&parsed, variant, raw, headers, None).await?);
        if !resource.state_full {
            self.cache().put(variant, parsed.as_str(), resource.clone());
        }
        Ok(resource)
    }

    async fn build(
        &self,
        url: &Url,
        variant: Variant,
        raw: Bytes,
        headers: &HeaderMap,
        encoded: Option<(Bytes, crate::http::ContentEncoding)>,
    ) -> Result<Resource> {
        let mime = mime_type(headers);
        match ResourceKind::detect(mime.as_deref(), url.as_str()) {
            Some(ResourceKind::Page) | None => self.compile(url, variant, raw, headers, encoded).await,
            Some(kind) => Ok(self
                .inner
                .resolver
                .loader()
                .build(url, headers, raw, encoded, kind)),
        }
    }

    /// Periodic maintenance: evict resources unused for the stale period.
    pub fn evict_stale(&self) -> usize {
        let evicted = self.cache().sweep_stale();
        let stats = self.stats();
        tracing::debug!(
            target: "htmlspeed::accelerator",
            evicted,
            entries = stats.entries,
            bytes = stats.bytes,
            hit_ratio = stats.hit_ratio(),
            "Stale sweep"
        );
        evicted
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.cache().stats()
    }
}

impl std::fmt::Debug for Accelerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accelerator")
            .field("cache", self.cache())
            .field("downgrades", &self.inner.downgrades.len())
            .finish()
    }
}
