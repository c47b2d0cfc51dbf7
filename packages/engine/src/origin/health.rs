//! Origin host health tracking

use dashmap::DashMap;

/// Receives fetch outcomes per origin host
pub trait HealthTracker: Send + Sync {
    fn report_failure(&self, host: &str);
    fn report_success(&self, host: &str);
    /// Unhealthy hosts are not fetched inline; browsers go to them directly.
    fn is_healthy(&self, host: &str) -> bool;
}

/// Counts consecutive failures per host
#[derive(Debug)]
pub struct HostHealth {
    failures: DashMap<String, u32>,
    threshold: u32,
}

impl HostHealth {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            failures: DashMap::new(),
            threshold: threshold.max(1),
        }
    }

    #[must_use]
    pub fn consecutive_failures(&self, host: &str) -> u32 {
        self.failures.get(host).map_or(0, |f| *f)
    }
}

impl Default for HostHealth {
    fn default() -> Self {
        Self::new(3)
    }
}

impl HealthTracker for HostHealth {
    fn report_failure(&self, host: &str) {
        let mut count = self.failures.entry(host.to_ascii_lowercase()).or_insert(0);
        *count = count.saturating_add(1);
        if *count == self.threshold {
            tracing::warn!(
                target: "htmlspeed::loader",
                host,
                failures = *count,
                "Origin host marked unhealthy"
            );
        }
    }

    fn report_success(&self, host: &str) {
        if self.failures.remove(&host.to_ascii_lowercase()).is_some() {
            tracing::debug!(target: "htmlspeed::loader", host, "Origin host healthy again");
        }
    }

    fn is_healthy(&self, host: &str) -> bool {
        self.consecutive_failures(&host.to_ascii_lowercase()) < self.threshold
    }
}
