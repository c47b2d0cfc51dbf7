//! Configuration Architecture
//!
//! Global accelerator settings, per-domain settings, validation and the
//! process-owned [`Registry`] that hands out immutable snapshots of both.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod domain;
pub mod registry;
pub mod validation;

pub use domain::{DomainConfig, DomainSpec};
pub use registry::Registry;
pub use validation::{ConfigResult, ConfigValidator, ConfigurationError, Validator};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Byte budget and eviction tiers for the resource cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheLimits {
    /// Reclamation starts once cached bytes plus the incoming entry exceed this
    pub max_total_size: u64,
    /// Reclamation stops once cached bytes drop below this
    pub lower_total_size: u64,
    pub large_entry_size: u64,
    pub medium_entry_size: u64,
    pub small_entry_size: u64,
    /// Resources larger than this are served but never cached
    pub max_resource_size: u64,
    /// Unused resources older than this are dropped by the daily sweep
    pub stale_after_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_total_size: 256 * MIB,
            lower_total_size: 224 * MIB,
            large_entry_size: 512 * KIB,
            medium_entry_size: 64 * KIB,
            small_entry_size: 8 * KIB,
            max_resource_size: 8 * MIB,
            stale_after_secs: 14 * 24 * 3600,
            sweep_interval_secs: 24 * 3600,
        }
    }
}

/// Size tiers that drive which references get inlined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineThresholds {
    pub tiny: usize,
    pub small: usize,
    pub medium: usize,
    /// Never inline anything larger
    pub huge: usize,
    /// IE 6-8 refuse data URIs above this length
    pub ie8_data_uri_limit: usize,
}

impl Default for InlineThresholds {
    fn default() -> Self {
        Self {
            tiny: 1024,
            small: 4 * 1024,
            medium: 16 * 1024,
            huge: 64 * 1024,
            ie8_data_uri_limit: 32 * 1024,
        }
    }
}

/// Freshness windows (seconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessPolicy {
    /// Floor applied to resources of a domain known to be state-less
    pub stateless_min_max_age: u64,
    pub max_max_age: u64,
    /// A resource this close to expiry is refreshed ahead of time
    pub refresh_gap: u64,
    /// Forced freshness of a resource restored after a failed refresh
    pub rollback_freshness: u64,
    /// Max-age served for version URLs
    pub version_max_age: u64,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            stateless_min_max_age: 300,
            max_max_age: 365 * 24 * 3600,
            refresh_gap: 5,
            rollback_freshness: 60,
            version_max_age: 365 * 24 * 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub fetch_timeout_ms: u64,
    /// Upper bound on waiting for all sub-resources of one page
    pub resolve_timeout_ms: u64,
}

impl TimeoutConfig {
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    #[must_use]
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 10_000,
            resolve_timeout_ms: 15_000,
        }
    }
}

/// Process-wide accelerator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceleratorConfig {
    pub cache: CacheLimits,
    pub inline: InlineThresholds,
    pub freshness: FreshnessPolicy,
    pub timeouts: TimeoutConfig,
    pub worker_queue_capacity: usize,
    /// First-visit pages compiling larger than this are downgraded
    pub oversized_page_limit: usize,
    pub image_quality: u8,
    pub gzip_level: u32,
    /// Consecutive failures after which an origin host counts as unhealthy
    pub unhealthy_after_failures: u32,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            cache: CacheLimits::default(),
            inline: InlineThresholds::default(),
            freshness: FreshnessPolicy::default(),
            timeouts: TimeoutConfig::default(),
            worker_queue_capacity: 256,
            oversized_page_limit: 512 * 1024,
            image_quality: 80,
            gzip_level: 6,
            unhealthy_after_failures: 3,
        }
    }
}

impl AcceleratorConfig {
    /// Parse from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Parse` for malformed JSON and any
    /// validation error for out-of-range values.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Validator for AcceleratorConfig {
    fn validate(&self) -> ConfigResult<()> {
        let cache = &self.cache;
        ConfigValidator::validate_size(cache.max_total_size, "cache.max_total_size")?;
        ConfigValidator::validate_ordering(
            cache.lower_total_size,
            cache.max_total_size,
            "cache.lower_total_size",
            "cache.max_total_size",
        )?;
        ConfigValidator::validate_ordering(
            cache.small_entry_size,
            cache.medium_entry_size,
            "cache.small_entry_size",
            "cache.medium_entry_size",
        )?;
        ConfigValidator::validate_ordering(
            cache.medium_entry_size,
            cache.large_entry_size,
            "cache.medium_entry_size",
            "cache.large_entry_size",
        )?;
        ConfigValidator::validate_size(cache.sweep_interval_secs, "cache.sweep_interval_secs")?;

        let inline = &self.inline;
        for (lower, upper, lower_name, upper_name) in [
            (inline.tiny, inline.small, "inline.tiny", "inline.small"),
            (inline.small, inline.medium, "inline.small", "inline.medium"),
            (inline.medium, inline.huge, "inline.medium", "inline.huge"),
        ] {
            ConfigValidator::validate_ordering(lower as u64, upper as u64, lower_name, upper_name)?;
        }

        ConfigValidator::validate_timeout(self.timeouts.fetch_timeout(), "timeouts.fetch_timeout_ms")?;
        ConfigValidator::validate_timeout(
            self.timeouts.resolve_timeout(),
            "timeouts.resolve_timeout_ms",
        )?;
        ConfigValidator::validate_size(self.worker_queue_capacity as u64, "worker_queue_capacity")?;
        if !(1..=100).contains(&self.image_quality) {
            return Err(ConfigurationError::InvalidParameter(format!(
                "image_quality must be within 1..=100, got {}",
                self.image_quality
            )));
        }
        if self.gzip_level > 9 {
            return Err(ConfigurationError::InvalidParameter(format!(
                "gzip_level must be within 0..=9, got {}",
                self.gzip_level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(AcceleratorConfig::default().validate().is_ok());
    }

    #[test]
    fn json_fills_missing_fields() {
        let config = AcceleratorConfig::from_json(r#"{"cache": {"max_total_size": 2048, "lower_total_size": 1024}}"#)
            .expect("valid config");
        assert_eq!(config.cache.max_total_size, 2048);
        assert_eq!(config.cache.small_entry_size, CacheLimits::default().small_entry_size);
        assert_eq!(config.image_quality, 80);
    }

    #[test]
    fn inverted_watermarks_are_rejected() {
        let mut config = AcceleratorConfig::default();
        config.cache.lower_total_size = config.cache.max_total_size + 1;
        assert!(matches!(config.validate(), Err(ConfigurationError::Conflict(_))));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            AcceleratorConfig::from_json("{"),
            Err(ConfigurationError::Parse(_))
        ));
    }
}
