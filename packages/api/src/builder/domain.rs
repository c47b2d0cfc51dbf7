//! Per-domain settings with a fluent interface

use htmlspeed_engine::config::DomainSpec;

/// Fluent builder for one accelerated domain
#[derive(Debug, Clone)]
#[must_use]
pub struct DomainBuilder {
    spec: DomainSpec,
}

impl DomainBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            spec: DomainSpec::new(host),
        }
    }

    /// Relay the domain's traffic unchanged.
    pub fn disabled(mut self) -> Self {
        self.spec.enabled = false;
        self
    }

    /// Never inline or fetch URLs matching `pattern` (a regex).
    pub fn no_inline(mut self, pattern: impl Into<String>) -> Self {
        self.spec.no_inline_patterns.push(pattern.into());
        self
    }

    /// Render content before scripts and iframes load.
    pub fn content_first(mut self) -> Self {
        self.spec.content_first = true;
        self
    }

    /// In content-first mode, load scripts matching `pattern` after the content.
    pub fn defer_script(mut self, pattern: impl Into<String>) -> Self {
        self.spec.deferred_script_patterns.push(pattern.into());
        self
    }

    /// Point references that are not inlined at long-lived version URLs.
    pub fn version_urls(mut self) -> Self {
        self.spec.version_urls = true;
        self
    }

    /// The domain's resources never depend on the visitor.
    pub fn known_stateless(mut self) -> Self {
        self.spec.known_stateless = true;
        self
    }

    /// Fetch from `authority` (`host[:port]`) instead of the request host.
    pub fn origin(mut self, authority: impl Into<String>) -> Self {
        self.spec.origin_authority = Some(authority.into());
        self
    }

    #[must_use]
    pub fn spec(&self) -> &DomainSpec {
        &self.spec
    }
}

impl From<DomainBuilder> for DomainSpec {
    fn from(builder: DomainBuilder) -> Self {
        builder.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_the_described_spec() {
        let spec: DomainSpec = DomainBuilder::new("shop.example")
            .content_first()
            .defer_script(r"ads\.js$")
            .no_inline(r"/private/")
            .origin("10.0.0.7:8080")
            .into();
        assert!(spec.enabled);
        assert!(spec.content_first);
        assert_eq!(spec.deferred_script_patterns, vec![r"ads\.js$".to_string()]);
        assert_eq!(spec.no_inline_patterns, vec!["/private/".to_string()]);
        assert_eq!(spec.origin_authority.as_deref(), Some("10.0.0.7:8080"));
        assert!(spec.compile().is_ok());
    }

    #[test]
    fn disabled_domains_compile() {
        let spec: DomainSpec = DomainBuilder::new("legacy.example").disabled().into();
        assert!(!spec.compile().expect("valid").enabled);
    }
}
