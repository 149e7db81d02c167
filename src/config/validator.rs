//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use crate::common::log::is_known_level;
use crate::config::error::{ConfigError, Result};
use crate::config::types::TunnelConfig;

/// Validate the configuration
pub fn validate_config(config: &TunnelConfig) -> Result<()> {
    validate_network_settings(config)?;
    validate_general_settings(config)?;

    Ok(())
}

/// Validate network settings
fn validate_network_settings(config: &TunnelConfig) -> Result<()> {
    if config.listen == config.target {
        return Err(ConfigError::InvalidCombination(
            "Listen and target addresses must be different".to_string()
        ));
    }

    if config.dial_timeout.is_zero() {
        return Err(ConfigError::InvalidValue(
            "dial_timeout".to_string(),
            "Dial timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate general settings
fn validate_general_settings(config: &TunnelConfig) -> Result<()> {
    if config.buffer_size == 0 {
        return Err(ConfigError::InvalidValue(
            "buffer_size".to_string(),
            "Buffer size must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Check configuration for warnings
pub fn check_warnings(config: &TunnelConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !is_known_level(&config.log_level) {
        warnings.push(format!("Invalid log level '{}', using default 'info'", config.log_level));
    }

    if config.keepalive.is_zero() {
        warnings.push("TCP keep-alive is disabled".to_string());
    }

    if config.shutdown_timeout.is_zero() {
        warnings.push("Shutdown grace period is 0, in-flight sessions will be abandoned immediately".to_string());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_listen_equals_target() {
        let config = TunnelConfig::new("127.0.0.1:9000", "127.0.0.1:9000");
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidCombination(_))));
    }

    #[test]
    fn test_zero_values() {
        let mut config = TunnelConfig::new("127.0.0.1:9000", "127.0.0.1:9001");
        assert!(validate_config(&config).is_ok());

        config.buffer_size = 0;
        assert!(validate_config(&config).is_err());

        let config = TunnelConfig::new("127.0.0.1:9000", "127.0.0.1:9001")
            .with_dial_timeout(Duration::ZERO);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_check_warnings() {
        let mut config = TunnelConfig::new("127.0.0.1:9000", "127.0.0.1:9001");
        assert!(check_warnings(&config).is_empty());

        config.log_level = "loud".to_string();
        config.keepalive = Duration::ZERO;
        assert_eq!(check_warnings(&config).len(), 2);

        // An unknown level is a warning, not a validation failure
        assert!(validate_config(&config).is_ok());
    }
}
