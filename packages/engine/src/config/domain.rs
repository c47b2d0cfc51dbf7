//! Per-domain settings

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use super::{ConfigResult, ConfigValidator, ConfigurationError, Validator};

/// Serializable description of one accelerated domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainSpec {
    pub host: String,
    pub enabled: bool,
    /// URLs matching any of these are never inlined or fetched inline
    pub no_inline_patterns: Vec<String>,
    /// Scripts matching any of these load after content in content-first mode
    pub deferred_script_patterns: Vec<String>,
    pub content_first: bool,
    pub version_urls: bool,
    /// Floor resource max-age at `stateless_min_max_age`
    pub known_stateless: bool,
    /// Fetch from this `host[:port]` instead of the request host
    pub origin_authority: Option<String>,
}

impl Default for DomainSpec {
    fn default() -> Self {
        Self {
            host: String::new(),
            enabled: true,
            no_inline_patterns: Vec::new(),
            deferred_script_patterns: Vec::new(),
            content_first: false,
            version_urls: false,
            known_stateless: false,
            origin_authority: None,
        }
    }
}

impl DomainSpec {
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns a `ConfigurationError` when the spec does not validate or a
    /// pattern fails to compile.
    pub fn compile(&self) -> ConfigResult<DomainConfig> {
        self.validate()?;
        let set = |patterns: &[String], name: &str| {
            RegexSet::new(patterns)
                .map_err(|e| ConfigurationError::InvalidPattern(format!("{name}: {e}")))
        };
        Ok(DomainConfig {
            host: self.host.to_ascii_lowercase(),
            enabled: self.enabled,
            no_inline: set(&self.no_inline_patterns, "no_inline_patterns")?,
            deferred_scripts: set(&self.deferred_script_patterns, "deferred_script_patterns")?,
            content_first: self.content_first,
            version_urls: self.version_urls,
            known_stateless: self.known_stateless,
            origin_authority: self.origin_authority.clone(),
        })
    }
}

impl Validator for DomainSpec {
    fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() || self.host.contains(['/', ' ']) {
            return Err(ConfigurationError::InvalidParameter(format!(
                "domain host {:?} is not a bare host name",
                self.host
            )));
        }
        ConfigValidator::validate_patterns(&self.no_inline_patterns, "no_inline_patterns")?;
        ConfigValidator::validate_patterns(
            &self.deferred_script_patterns,
            "deferred_script_patterns",
        )?;
        if self.deferred_script_patterns.iter().any(|p| !p.is_empty()) && !self.content_first {
            return Err(ConfigurationError::Conflict(
                "deferred_script_patterns require content_first".to_string(),
            ));
        }
        Ok(())
    }
}

/// Compiled, immutable snapshot of a domain's settings
#[derive(Debug, Clone)]
pub struct DomainConfig {
    pub host: String,
    pub enabled: bool,
    pub no_inline: RegexSet,
    pub deferred_scripts: RegexSet,
    pub content_first: bool,
    pub version_urls: bool,
    pub known_stateless: bool,
    pub origin_authority: Option<String>,
}

impl DomainConfig {
    /// Settings for hosts nobody configured.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            host: String::new(),
            enabled: true,
            no_inline: RegexSet::empty(),
            deferred_scripts: RegexSet::empty(),
            content_first: false,
            version_urls: false,
            known_stateless: false,
            origin_authority: None,
        }
    }

    #[must_use]
    pub fn is_no_inline(&self, url: &str) -> bool {
        self.no_inline.is_match(url)
    }

    #[must_use]
    pub fn is_deferred_script(&self, url: &str) -> bool {
        self.content_first && self.deferred_scripts.is_match(url)
    }
}
