//! Configuration validation

use std::time::Duration;

/// Configuration validation result type
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Configuration error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Invalid timeout value: {0}")]
    InvalidTimeout(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid configuration parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration conflict: {0}")]
    Conflict(String),

    #[error("Configuration could not be parsed: {0}")]
    Parse(String),
}

/// Configuration validation trait
pub trait Validator {
    /// Validates the configuration settings
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` variant describing the first invalid setting.
    fn validate(&self) -> ConfigResult<()>;
}

/// Common configuration validation utilities
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate timeout duration
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidTimeout` if the duration is zero or
    /// exceeds 10 minutes.
    pub fn validate_timeout(timeout: Duration, name: &str) -> ConfigResult<()> {
        if timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout(format!(
                "{name} cannot be zero"
            )));
        }

        if timeout.as_secs() > 600 {
            return Err(ConfigurationError::InvalidTimeout(format!(
                "{name} cannot exceed 10 minutes"
            )));
        }

        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidSize` if the value is zero.
    pub fn validate_size(size: u64, name: &str) -> ConfigResult<()> {
        if size == 0 {
            return Err(ConfigurationError::InvalidSize(format!(
                "{name} cannot be zero"
            )));
        }
        Ok(())
    }

    /// Require `lower <= upper`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Conflict` when the pair is inverted.
    pub fn validate_ordering(
        lower: u64,
        upper: u64,
        lower_name: &str,
        upper_name: &str,
    ) -> ConfigResult<()> {
        if lower > upper {
            return Err(ConfigurationError::Conflict(format!(
                "{lower_name} ({lower}) must not exceed {upper_name} ({upper})"
            )));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidPattern` naming the first pattern
    /// that fails to compile.
    pub fn validate_patterns(patterns: &[String], name: &str) -> ConfigResult<()> {
        for pattern in patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigurationError::InvalidPattern(format!(
                    "{name}: {pattern:?}: {e}"
                )));
            }
        }
        Ok(())
    }
}
