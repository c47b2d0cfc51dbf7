//! Background loader for state-full pages
//!
//! Browsers of a state-full page fetch its sub-resources directly; the
//! worker fills the cache behind them so later pages can inline. Jobs go
//! through a bounded queue and are dropped, not awaited, when it is full.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::loader::Loader;
use crate::cache::LoadTicket;
use crate::error::{self, Result};
use crate::resource::ResourceKind;

/// Sub-resource loads claimed while compiling one state-full page
#[derive(Debug)]
pub struct Job {
    pub page: String,
    pub tickets: Vec<(LoadTicket, ResourceKind)>,
}

/// Producer handle for the worker queue
#[derive(Debug, Clone)]
pub struct Worker {
    tx: mpsc::Sender<Job>,
}

impl Worker {
    /// Start the worker task on the current Tokio runtime.
    pub fn spawn(loader: Loader, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run(rx, loader));
        (Self { tx }, handle)
    }

    /// Queue `job` without waiting.
    ///
    /// # Errors
    ///
    /// A full or closed queue drops the job; its tickets settle as failed.
    pub fn submit(&self, job: Job) -> Result<()> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                tracing::warn!(
                    target: "htmlspeed::worker",
                    page = %job.page,
                    loads = job.tickets.len(),
                    "Worker queue full, dropping job"
                );
                Err(error::worker("queue full").with_url(job.page))
            }
            Err(TrySendError::Closed(job)) => {
                tracing::warn!(
                    target: "htmlspeed::worker",
                    page = %job.page,
                    loads = job.tickets.len(),
                    "Worker stopped, dropping job"
                );
                Err(error::worker("worker stopped").with_url(job.page))
            }
        }
    }

    /// Free queue slots
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

async fn run(mut rx: mpsc::Receiver<Job>, loader: Loader) {
    tracing::debug!(target: "htmlspeed::worker", "Worker started");
    while let Some(job) = rx.recv().await {
        let loads = job.tickets.len();
        for (ticket, expected) in job.tickets {
            loader.load(ticket, expected).await;
        }
        tracing::debug!(target: "htmlspeed::worker", page = %job.page, loads, "Job done");
    }
    tracing::debug!(target: "htmlspeed::worker", "Worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use futures::future::BoxFuture;
    use http::header::{CACHE_CONTROL, CONTENT_TYPE};
    use http::{HeaderMap, HeaderValue};

    use super::*;
    use crate::cache::{LoadState, Lookup, ResourceCache};
    use crate::clock::ManualClock;
    use crate::config::{AcceleratorConfig, Registry};
    use crate::error::Kind;
    use crate::origin::{FetchFailure, HostHealth, NoCdn, OriginFetch, OriginRequest, OriginResponse, PassThroughImages};
    use crate::resolver::Context;
    use crate::variant::{BrowserClass, Variant};

    const SCRIPT: &str = "http://a.example/app.js";

    struct ScriptOrigin;

    impl OriginFetch for ScriptOrigin {
        fn fetch(&self, _request: OriginRequest) -> BoxFuture<'_, std::result::Result<OriginResponse, FetchFailure>> {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/javascript"));
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=600"));
            Box::pin(async move { Ok(OriginResponse::ok(headers, Bytes::from_static(b"var x=1;"))) })
        }
    }

    fn context() -> Context {
        let config = AcceleratorConfig::default();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = Arc::new(ResourceCache::new(
            config.cache.clone(),
            config.freshness.clone(),
            clock.clone(),
        ));
        Context {
            registry: Arc::new(Registry::new(config, &[]).expect("valid configuration")),
            cache,
            origin: Arc::new(ScriptOrigin),
            images: Arc::new(PassThroughImages),
            cdn: Arc::new(NoCdn),
            health: Arc::new(HostHealth::new(3)),
            clock,
        }
    }

    fn claim(cache: &Arc<ResourceCache>, url: &str) -> LoadTicket {
        match cache.acquire(Variant::first_visit(BrowserClass::Desktop), url, false) {
            Lookup::Load(ticket) => ticket,
            other => panic!("expected to become the loader, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn jobs_fill_the_cache_behind_the_page() {
        let ctx = context();
        let cache = ctx.cache.clone();
        let (worker, _task) = Worker::spawn(Loader::new(ctx), 4);

        let ticket = claim(&cache, SCRIPT);
        let Lookup::Wait(waiter) = cache.acquire(Variant::first_visit(BrowserClass::Desktop), SCRIPT, false) else {
            panic!("second claim should wait on the first");
        };
        worker
            .submit(Job {
                page: "http://a.example/cart".into(),
                tickets: vec![(ticket, ResourceKind::Js)],
            })
            .expect("queued");

        let LoadState::Ready(resource) = waiter.wait().await else {
            panic!("background load should succeed");
        };
        assert_eq!(resource.kind, ResourceKind::Js);
        assert!(matches!(
            cache.acquire(Variant::first_visit(BrowserClass::Mobile), SCRIPT, false),
            Lookup::Fresh(_)
        ));
    }

    #[tokio::test]
    async fn a_full_queue_drops_the_job_and_fails_its_loads() {
        let ctx = context();
        let cache = ctx.cache.clone();
        // Nobody drains the queue.
        let (tx, _rx) = mpsc::channel(1);
        let worker = Worker { tx };

        let queued = claim(&cache, "http://a.example/one.js");
        worker
            .submit(Job {
                page: "http://a.example/p1".into(),
                tickets: vec![(queued, ResourceKind::Js)],
            })
            .expect("first job fits");
        assert_eq!(worker.capacity(), 0);

        let dropped = claim(&cache, SCRIPT);
        let Lookup::Wait(waiter) = cache.acquire(Variant::first_visit(BrowserClass::Desktop), SCRIPT, false) else {
            panic!("second claim should wait on the first");
        };
        let err = worker
            .submit(Job {
                page: "http://a.example/p2".into(),
                tickets: vec![(dropped, ResourceKind::Js)],
            })
            .unwrap_err();
        assert_eq!(err.kind(), Kind::Worker);
        assert_eq!(err.url(), Some("http://a.example/p2"));
        assert!(matches!(waiter.wait().await, LoadState::Failed { fallback: None, .. }));
    }

    #[tokio::test]
    async fn a_stopped_worker_rejects_jobs() {
        let ctx = context();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let worker = Worker { tx };
        let ticket = claim(&ctx.cache, SCRIPT);
        let err = worker
            .submit(Job {
                page: "http://a.example/p".into(),
                tickets: vec![(ticket, ResourceKind::Js)],
            })
            .unwrap_err();
        assert_eq!(err.kind(), Kind::Worker);
    }
}
