//! In-flight markers for single-flight loading
//!
//! A [`Placeholder`] occupies a cache key while one loader fetches it. Its
//! completion is a `watch` channel set exactly once from `Pending` to a
//! terminal [`LoadState`]; every [`Waiter`] observes that value.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::resource::Resource;

/// Outcome of a load, as seen by waiters
#[derive(Debug, Clone)]
pub enum LoadState {
    Pending,
    Ready(Arc<Resource>),
    /// The load produced per-user content; each waiter must fetch its own.
    Private,
    Failed {
        /// The origin exchange itself failed (connect error, timeout)
        communication_failed: bool,
        /// Previous resource restored by a rolled-back refresh
        fallback: Option<Arc<Resource>>,
    },
}

impl LoadState {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, LoadState::Pending)
    }

    /// The resource a waiter may use: the loaded one, or the rollback fallback.
    #[must_use]
    pub fn resource(&self) -> Option<&Arc<Resource>> {
        match self {
            LoadState::Ready(resource) => Some(resource),
            LoadState::Failed { fallback, .. } => fallback.as_ref(),
            LoadState::Pending | LoadState::Private => None,
        }
    }
}

pub struct Placeholder {
    tx: watch::Sender<LoadState>,
    /// Resource being refreshed, `None` for a first load
    replacer: Option<Arc<Resource>>,
}

impl Placeholder {
    pub(crate) fn new(replacer: Option<Arc<Resource>>) -> Arc<Self> {
        let (tx, _rx) = watch::channel(LoadState::Pending);
        Arc::new(Self { tx, replacer })
    }

    #[must_use]
    pub fn replacer(&self) -> Option<&Arc<Resource>> {
        self.replacer.as_ref()
    }

    pub(crate) fn waiter(&self) -> Waiter {
        Waiter {
            rx: self.tx.subscribe(),
        }
    }

    /// Publish the terminal state; later calls are ignored.
    pub(crate) fn settle(&self, state: LoadState) {
        self.tx.send_if_modified(|current| {
            if current.is_pending() {
                *current = state;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn waiters(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Placeholder")
            .field("state", &*self.tx.borrow())
            .field("refresh", &self.replacer.is_some())
            .finish()
    }
}

/// Handle on another task's load
#[derive(Debug)]
pub struct Waiter {
    rx: watch::Receiver<LoadState>,
}

impl Waiter {
    /// Block until the loader settles.
    ///
    /// A loader that vanished without settling counts as a failed load.
    pub async fn wait(mut self) -> LoadState {
        match self.rx.wait_for(|state| !state.is_pending()).await {
            Ok(state) => state.clone(),
            Err(_) => LoadState::Failed {
                communication_failed: false,
                fallback: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;
    use crate::resource::{ResourceBuilder, ResourceKind};

    fn resource() -> Arc<Resource> {
        Arc::new(ResourceBuilder::new(ResourceKind::Js, "http://a.com/a.js", "go()").build())
    }

    #[tokio::test]
    async fn waiters_see_the_first_settled_state() {
        let placeholder = Placeholder::new(None);
        let a = placeholder.waiter();
        let b = placeholder.waiter();
        assert_eq!(placeholder.waiters(), 2);
        let loaded = resource();
        placeholder.settle(LoadState::Ready(loaded.clone()));
        placeholder.settle(LoadState::Failed {
            communication_failed: true,
            fallback: None,
        });
        for waiter in [a, b] {
            let state = waiter.wait().await;
            assert!(Arc::ptr_eq(state.resource().unwrap(), &loaded));
        }
        // Subscribing after settlement still observes the outcome.
        assert!(placeholder.waiter().wait().await.resource().is_some());
    }

    #[tokio::test]
    async fn dropped_placeholder_releases_waiters() {
        let placeholder = Placeholder::new(Some(resource()));
        let waiter = placeholder.waiter();
        drop(placeholder);
        let state = waiter.wait().await;
        assert!(matches!(
            state,
            LoadState::Failed {
                communication_failed: false,
                fallback: None
            }
        ));
    }

    #[test]
    fn waiting_blocks_until_settled() {
        let placeholder = Placeholder::new(None);
        let mut wait = task::spawn(placeholder.waiter().wait());
        assert_pending!(wait.poll());

        placeholder.settle(LoadState::Private);
        assert!(wait.is_woken());
        let state = assert_ready!(wait.poll());
        assert!(matches!(state, LoadState::Private));
        assert!(state.resource().is_none());
    }
}
