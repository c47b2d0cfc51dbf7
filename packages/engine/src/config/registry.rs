//! Process-owned configuration registry
//!
//! Readers clone an `Arc` snapshot and drop the lock straight away, so an
//! in-flight request keeps a consistent view across a reload. Reloads
//! validate and compile first, then swap the snapshot.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::{AcceleratorConfig, ConfigResult, DomainConfig, DomainSpec, Validator};

#[derive(Debug)]
struct DomainSlot {
    config: RwLock<Arc<DomainConfig>>,
}

#[derive(Debug)]
pub struct Registry {
    global: RwLock<Arc<AcceleratorConfig>>,
    domains: RwLock<HashMap<String, Arc<DomainSlot>>>,
    fallback: Arc<DomainConfig>,
}

impl Registry {
    /// # Errors
    ///
    /// Returns the first validation error of `config` or of any domain.
    pub fn new(config: AcceleratorConfig, domains: &[DomainSpec]) -> ConfigResult<Self> {
        config.validate()?;
        let mut slots = HashMap::with_capacity(domains.len());
        for spec in domains {
            let compiled = spec.compile()?;
            slots.insert(
                compiled.host.clone(),
                Arc::new(DomainSlot {
                    config: RwLock::new(Arc::new(compiled)),
                }),
            );
        }
        Ok(Self {
            global: RwLock::new(Arc::new(config)),
            domains: RwLock::new(slots),
            fallback: Arc::new(DomainConfig::fallback()),
        })
    }

    /// Current global snapshot
    #[must_use]
    pub fn config(&self) -> Arc<AcceleratorConfig> {
        Arc::clone(&self.global.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Snapshot for `host`, or the fallback for unconfigured hosts.
    #[must_use]
    pub fn domain(&self, host: &str) -> Arc<DomainConfig> {
        let slot = {
            let domains = self.domains.read().unwrap_or_else(PoisonError::into_inner);
            domains.get(&host.to_ascii_lowercase()).cloned()
        };
        match slot {
            Some(slot) => {
                let config = slot.config.read().unwrap_or_else(PoisonError::into_inner);
                Arc::clone(&config)
            }
            None => Arc::clone(&self.fallback),
        }
    }

    /// # Errors
    ///
    /// Returns the validation error; the previous snapshot stays active.
    pub fn reload_config(&self, config: AcceleratorConfig) -> ConfigResult<()> {
        if let Err(e) = config.validate() {
            tracing::error!(target: "htmlspeed::config", error = %e, "Rejected configuration reload");
            return Err(e);
        }
        *self.global.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        tracing::debug!(target: "htmlspeed::config", "Global configuration reloaded");
        Ok(())
    }

    /// Add or replace one domain. Existing domains are swapped under their
    /// own lock only, so traffic for other domains is not held up.
    ///
    /// # Errors
    ///
    /// Returns the validation or pattern error; nothing changes in that case.
    pub fn upsert_domain(&self, spec: &DomainSpec) -> ConfigResult<()> {
        let compiled = match spec.compile() {
            Ok(compiled) => Arc::new(compiled),
            Err(e) => {
                tracing::error!(
                    target: "htmlspeed::config",
                    host = %spec.host,
                    error = %e,
                    "Rejected domain configuration"
                );
                return Err(e);
            }
        };
        let host = compiled.host.clone();

        let existing = {
            let domains = self.domains.read().unwrap_or_else(PoisonError::into_inner);
            domains.get(&host).cloned()
        };
        if let Some(slot) = existing {
            *slot.config.write().unwrap_or_else(PoisonError::into_inner) = compiled;
        } else {
            let mut domains = self.domains.write().unwrap_or_else(PoisonError::into_inner);
            match domains.get(&host) {
                Some(slot) => {
                    *slot.config.write().unwrap_or_else(PoisonError::into_inner) = compiled;
                }
                None => {
                    domains.insert(
                        host.clone(),
                        Arc::new(DomainSlot {
                            config: RwLock::new(compiled),
                        }),
                    );
                }
            }
        }
        tracing::debug!(target: "htmlspeed::config", host = %host, "Domain configuration updated");
        Ok(())
    }

    /// Returns true if the host was configured.
    pub fn remove_domain(&self, host: &str) -> bool {
        self.domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&host.to_ascii_lowercase())
            .is_some()
    }

    #[must_use]
    pub fn hosts(&self) -> Vec<String> {
        let domains = self.domains.read().unwrap_or_else(PoisonError::into_inner);
        let mut hosts: Vec<String> = domains.keys().cloned().collect();
        hosts.sort();
        hosts
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            global: RwLock::new(Arc::new(AcceleratorConfig::default())),
            domains: RwLock::new(HashMap::new()),
            fallback: Arc::new(DomainConfig::fallback()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_hosts_get_the_fallback() {
        let registry = Registry::new(AcceleratorConfig::default(), &[DomainSpec::new("a.com")])
            .expect("valid");
        assert_eq!(registry.domain("A.COM").host, "a.com");
        assert_eq!(registry.domain("b.com").host, "");
    }

    #[test]
    fn snapshots_survive_reload() {
        let registry = Registry::default();
        let before = registry.config();
        let mut next = AcceleratorConfig::default();
        next.image_quality = 50;
        registry.reload_config(next).expect("valid");
        assert_eq!(before.image_quality, 80);
        assert_eq!(registry.config().image_quality, 50);
    }

    #[test]
    fn invalid_reload_keeps_previous() {
        let registry = Registry::default();
        let mut bad = AcceleratorConfig::default();
        bad.gzip_level = 42;
        assert!(registry.reload_config(bad).is_err());
        assert_eq!(registry.config().gzip_level, 6);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let registry = Registry::default();
        registry.upsert_domain(&DomainSpec::new("a.com")).expect("valid");
        let held = registry.domain("a.com");
        let spec = DomainSpec {
            version_urls: true,
            ..DomainSpec::new("a.com")
        };
        registry.upsert_domain(&spec).expect("valid");
        assert!(!held.version_urls);
        assert!(registry.domain("a.com").version_urls);
        assert_eq!(registry.hosts(), vec!["a.com".to_string()]);
        assert!(registry.remove_domain("a.com"));
        assert!(!registry.remove_domain("a.com"));
    }
}
