//! Sub-resource resolution
//!
//! For every reference of a page the resolver finds a ready resource:
//! straight from the cache, by waiting on another task's load, or by loading
//! it. Loads run as their own tasks, so a resolve that runs out of time
//! leaves them to finish into the cache. Nothing here fails the page: a
//! reference without a resource is simply left for the browser.

pub mod budget;
pub mod loader;
pub mod references;
pub mod worker;

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use url::Url;

pub use budget::{Bucket, Decision, PlanContext, admitted_per_bucket, plan};
pub use loader::{Fetched, Loader};
pub use references::{RefClass, Reference, extract};
pub use worker::{Job, Worker};

use crate::cache::{Lookup, ResourceCache};
use crate::clock::Clock;
use crate::config::{DomainConfig, Registry};
use crate::origin::{CdnLookup, HealthTracker, ImageOptimizer, OriginFetch};
use crate::resource::Resource;
use crate::scanner::Scan;
use crate::variant::{Variant, Visit};

/// Shared collaborators every resolving stage needs
#[derive(Clone)]
pub struct Context {
    pub registry: Arc<Registry>,
    pub cache: Arc<ResourceCache>,
    pub origin: Arc<dyn OriginFetch>,
    pub images: Arc<dyn ImageOptimizer>,
    pub cdn: Arc<dyn CdnLookup>,
    pub health: Arc<dyn HealthTracker>,
    pub clock: Arc<dyn Clock>,
}

/// A scanned page awaiting resolution
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    pub doc: &'a [u8],
    pub scan: &'a Scan,
    /// Base URL references resolve against
    pub base: &'a Url,
    pub variant: Variant,
    /// Sub-resource loads go to the background worker
    pub state_full: bool,
    pub domain: &'a DomainConfig,
}

/// References of a page with the resources found for them
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    pub refs: Vec<Reference>,
    /// Parallel to `refs`; repeats share their first occurrence's resource
    pub resources: Vec<Option<Arc<Resource>>>,
}

impl Resolved {
    #[must_use]
    pub fn ready(&self) -> usize {
        self.resources.iter().flatten().count()
    }
}

pub struct Resolver {
    ctx: Context,
    loader: Loader,
    worker: Worker,
}

impl Resolver {
    pub fn new(ctx: Context, worker: Worker) -> Self {
        Self {
            loader: Loader::new(ctx.clone()),
            ctx,
            worker,
        }
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Find resources for every reference of `page` within the resolve
    /// timeout.
    pub async fn resolve(&self, page: &Page<'_>) -> Resolved {
        let refs = extract(page.doc, page.scan, page.base, page.domain);
        let mut resources: Vec<Option<Arc<Resource>>> = vec![None; refs.len()];
        let mut pending: FuturesUnordered<BoxFuture<'static, (usize, Option<Arc<Resource>>)>> =
            FuturesUnordered::new();
        let mut background = Vec::new();
        // Fourth visits inline nothing; cached resources still get substituted.
        let cache_only = page.variant.visit() == Some(Visit::Fourth);
        let cache = &self.ctx.cache;

        for (i, reference) in refs.iter().enumerate() {
            if reference.is_repeat() {
                continue;
            }
            let url = reference.url.as_str();
            let host = reference.url.host_str().unwrap_or_default();
            if cache_only || !self.ctx.health.is_healthy(host) {
                resources[i] = cache.get_fresh(Variant::NON_PAGE, url);
                continue;
            }
            let expected = reference.class.kind();
            match cache.acquire(Variant::NON_PAGE, url, false) {
                Lookup::Fresh(resource) => resources[i] = Some(resource),
                Lookup::Wait(waiter) => {
                    pending.push(async move { (i, waiter.wait().await.resource().cloned()) }.boxed());
                }
                Lookup::Load(ticket) => {
                    if let Some(current) = ticket.fresh_replacer() {
                        // Refresh in the background, serve what we have.
                        resources[i] = Some(current);
                        if page.state_full {
                            background.push((ticket, expected));
                        } else {
                            let loader = self.loader.clone();
                            tokio::spawn(async move { loader.load(ticket, expected).await });
                        }
                    } else if page.state_full {
                        background.push((ticket, expected));
                    } else {
                        let loader = self.loader.clone();
                        let load = tokio::spawn(async move { loader.load(ticket, expected).await });
                        pending.push(async move { (i, load.await.ok().flatten()) }.boxed());
                    }
                }
            }
        }

        if !background.is_empty() {
            let job = Job {
                page: page.base.to_string(),
                tickets: background,
            };
            if let Err(e) = self.worker.submit(job) {
                // Browsers of this page fetch the dropped resources themselves.
                tracing::debug!(target: "htmlspeed::resolver", url = %page.base, error = %e, "Background loads dropped");
            }
        }

        if !pending.is_empty() {
            let timeout = self.ctx.registry.config().timeouts.resolve_timeout();
            let deadline = tokio::time::sleep(timeout);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    next = pending.next() => match next {
                        Some((i, resource)) => {
                            if let Some(slot) = resources.get_mut(i) {
                                *slot = resource;
                            }
                        }
                        None => break,
                    },
                    () = &mut deadline => {
                        tracing::debug!(
                            target: "htmlspeed::resolver",
                            page = %page.base,
                            outstanding = pending.len(),
                            "Resolve timed out, leaving references unresolved"
                        );
                        break;
                    }
                }
            }
        }

        for i in 0..refs.len() {
            if let Some(first) = refs[i].first {
                resources[i] = resources.get(first).cloned().flatten();
            }
        }

        let resolved = Resolved { refs, resources };
        tracing::trace!(
            target: "htmlspeed::resolver",
            page = %page.base,
            references = resolved.refs.len(),
            ready = resolved.ready(),
            "Resolved references"
        );
        resolved
    }

    /// Inlining decisions for `resolved` under `variant`.
    #[must_use]
    pub fn plan(&self, resolved: &Resolved, variant: Variant, https: bool, domain: &DomainConfig) -> Vec<Decision> {
        let config = self.ctx.registry.config();
        let ctx = PlanContext {
            variant,
            https,
            version_urls: domain.version_urls,
            thresholds: &config.inline,
            cdn: self.ctx.cdn.as_ref(),
        };
        plan(&resolved.refs, &resolved.resources, &ctx)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}
