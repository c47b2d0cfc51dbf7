//! Core `AcceleratorBuilder` structure and its configuration methods
//!
//! Settings accumulate in an [`AcceleratorConfig`] and a list of domain
//! specs; nothing is validated until [`AcceleratorBuilder::build`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use htmlspeed_engine::error;
use htmlspeed_engine::prelude::*;

use super::domain::DomainBuilder;

/// Fluent builder for an [`Accelerator`]
#[must_use]
pub struct AcceleratorBuilder {
    pub(crate) config: AcceleratorConfig,
    pub(crate) domains: Vec<DomainSpec>,
    pub(crate) collaborators: Collaborators,
    /// Deferred failure from a setter that parses input
    pub(crate) error: Option<Error>,
}

impl AcceleratorBuilder {
    /// Defaults for everything but the origin client.
    pub fn new(origin: Arc<dyn OriginFetch>) -> Self {
        Self {
            config: AcceleratorConfig::default(),
            domains: Vec::new(),
            collaborators: Collaborators::new(origin),
            error: None,
        }
    }

    /// Replace the whole global configuration.
    pub fn config(mut self, config: AcceleratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Global configuration from JSON; a parse error surfaces from `build`.
    pub fn config_json(mut self, json: &str) -> Self {
        match AcceleratorConfig::from_json(json) {
            Ok(config) => self.config = config,
            Err(e) => {
                tracing::error!(target: "htmlspeed::config", error = %e, "Invalid accelerator configuration");
                self.error.get_or_insert(error::configuration(e));
            }
        }
        self
    }

    pub fn cache_limits(mut self, limits: CacheLimits) -> Self {
        self.config.cache = limits;
        self
    }

    /// Total cache byte budget; the reclaim target stays at seven eighths.
    pub fn cache_size(mut self, bytes: u64) -> Self {
        self.config.cache.max_total_size = bytes;
        self.config.cache.lower_total_size = bytes - bytes / 8;
        self
    }

    pub fn inline_thresholds(mut self, thresholds: InlineThresholds) -> Self {
        self.config.inline = thresholds;
        self
    }

    pub fn freshness(mut self, policy: FreshnessPolicy) -> Self {
        self.config.freshness = policy;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.fetch_timeout_ms = duration_ms(timeout);
        self
    }

    /// Upper bound on waiting for a page's sub-resources.
    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.resolve_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn worker_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.worker_queue_capacity = capacity;
        self
    }

    pub fn oversized_page_limit(mut self, bytes: usize) -> Self {
        self.config.oversized_page_limit = bytes;
        self
    }

    pub fn gzip_level(mut self, level: u32) -> Self {
        self.config.gzip_level = level;
        self
    }

    pub fn image_quality(mut self, quality: u8) -> Self {
        self.config.image_quality = quality;
        self
    }

    pub fn unhealthy_after_failures(mut self, failures: u32) -> Self {
        self.config.unhealthy_after_failures = failures;
        self
    }

    pub fn images(mut self, images: Arc<dyn ImageOptimizer>) -> Self {
        self.collaborators.images = images;
        self
    }

    pub fn cdn(mut self, cdn: Arc<dyn CdnLookup>) -> Self {
        self.collaborators.cdn = cdn;
        self
    }

    pub fn health(mut self, health: Arc<dyn HealthTracker>) -> Self {
        self.collaborators.health = Some(health);
        self
    }

    /// Time source for freshness; tests drive a [`ManualClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.collaborators.clock = clock;
        self
    }

    /// Accelerate `domain`; a later spec for the same host replaces it.
    pub fn domain(mut self, domain: impl Into<DomainSpec>) -> Self {
        let spec = domain.into();
        self.domains
            .retain(|existing| !existing.host.eq_ignore_ascii_case(&spec.host));
        self.domains.push(spec);
        self
    }

    /// Domain specs from a JSON array; a parse error surfaces from `build`.
    pub fn domains_json(mut self, json: &str) -> Self {
        match serde_json::from_str::<Vec<DomainSpec>>(json) {
            Ok(specs) => {
                for spec in specs {
                    self = self.domain(spec);
                }
            }
            Err(e) => {
                tracing::error!(target: "htmlspeed::config", error = %e, "Invalid domain list");
                self.error.get_or_insert(error::configuration(e));
            }
        }
        self
    }

    /// Shorthand for `domain(DomainBuilder::new(host))`.
    pub fn accelerate(self, host: impl Into<String>) -> Self {
        self.domain(DomainBuilder::new(host))
    }

    /// Validate everything and start the accelerator.
    ///
    /// # Errors
    ///
    /// The first configuration error, or a missing Tokio runtime.
    pub fn build(self) -> Result<Accelerator> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let registry = Registry::new(self.config, &self.domains).map_err(error::configuration)?;
        tracing::debug!(
            target: "htmlspeed::config",
            domains = self.domains.len(),
            "Building accelerator"
        );
        Accelerator::new(Arc::new(registry), self.collaborators)
    }
}

impl fmt::Debug for AcceleratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcceleratorBuilder")
            .field("config", &self.config)
            .field("domains", &self.domains)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
