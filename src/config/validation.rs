//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, rates positive)
//! - Check the API surface is routable (prefix shape, version names)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("at least one homeserver must be configured")]
    NoHomeservers,
    #[error("homeserver name must not be empty")]
    EmptyHomeserverName,
    #[error("at least one API version must be configured")]
    NoVersions,
    #[error("invalid API version `{0}`: only lowercase letters and digits are allowed")]
    InvalidVersion(String),
    #[error("api_prefix `{0}` must start with `/` and must not end with `/`")]
    InvalidPrefix(String),
    #[error("uploads.max_bytes must be greater than zero")]
    ZeroUploadLimit,
    #[error("thumbnail limits must be greater than zero")]
    ZeroThumbnailLimit,
    #[error("rate_limit.requests_per_second must be positive, got {0}")]
    InvalidRate(f64),
    #[error("rate_limit.burst_count must be at least 1")]
    ZeroBurst,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.homeservers.is_empty() {
        errors.push(ValidationError::NoHomeservers);
    }
    if config.homeservers.iter().any(|hs| hs.name.trim().is_empty()) {
        errors.push(ValidationError::EmptyHomeserverName);
    }

    if config.general.versions.is_empty() {
        errors.push(ValidationError::NoVersions);
    }
    for version in &config.general.versions {
        let valid = !version.is_empty()
            && version
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        if !valid {
            errors.push(ValidationError::InvalidVersion(version.clone()));
        }
    }

    let prefix = &config.general.api_prefix;
    if !prefix.starts_with('/') || prefix.ends_with('/') {
        errors.push(ValidationError::InvalidPrefix(prefix.clone()));
    }

    if config.uploads.max_bytes == 0 {
        errors.push(ValidationError::ZeroUploadLimit);
    }
    if config.thumbnails.max_width == 0 || config.thumbnails.max_height == 0 {
        errors.push(ValidationError::ZeroThumbnailLimit);
    }

    if config.rate_limit.enabled {
        let rate = config.rate_limit.requests_per_second;
        if !(rate.is_finite() && rate > 0.0) {
            errors.push(ValidationError::InvalidRate(rate));
        }
        if config.rate_limit.burst_count == 0 {
            errors.push(ValidationError::ZeroBurst);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.homeservers.clear();
        config.general.api_prefix = "media/".into();
        config.general.versions = vec!["R0".into()];
        config.rate_limit.enabled = true;
        config.rate_limit.burst_count = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::NoHomeservers));
        assert!(errors.contains(&ValidationError::InvalidPrefix("media/".into())));
        assert!(errors.contains(&ValidationError::InvalidVersion("R0".into())));
        assert!(errors.contains(&ValidationError::ZeroBurst));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_rate_limit_only_checked_when_enabled() {
        let mut config = GatewayConfig::default();
        config.rate_limit.requests_per_second = 0.0;
        assert!(validate_config(&config).is_ok());

        config.rate_limit.enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidRate(0.0)]
        );
    }
}
