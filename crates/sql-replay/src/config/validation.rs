//! Configuration validation.

use super::Config;
use crate::error::{ReplayError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(ReplayError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(ReplayError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(ReplayError::Config("source.user is required".into()));
    }
    if !is_plain_identifier(&config.source.table) {
        return Err(ReplayError::Config(format!(
            "source.table must be a plain identifier, got '{}'",
            config.source.table
        )));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(ReplayError::Config("target.host is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(ReplayError::Config("target.user is required".into()));
    }

    // Replay config validation - only check workers if explicitly set
    if config.replay.batch_size == 0 {
        return Err(ReplayError::Config(
            "replay.batch_size must be at least 1".into(),
        ));
    }
    if let Some(0) = config.replay.workers {
        return Err(ReplayError::Config(
            "replay.workers must be at least 1".into(),
        ));
    }
    if !is_plain_identifier(&config.replay.schema_prefix) {
        return Err(ReplayError::Config(format!(
            "replay.schema_prefix must be a plain identifier, got '{}'",
            config.replay.schema_prefix
        )));
    }
    if config.replay.connect_retries == 0 {
        return Err(ReplayError::Config(
            "replay.connect_retries must be at least 1".into(),
        ));
    }
    if config.replay.extra_filters.iter().any(|f| f.trim().is_empty()) {
        return Err(ReplayError::Config(
            "replay.extra_filters must not contain empty patterns".into(),
        ));
    }

    Ok(())
}

/// Non-empty and limited to `[A-Za-z0-9_]`, so it can be spliced into SQL.
fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_user() {
        let mut config = valid_config();
        config.target.user = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = valid_config();
        config.replay.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_workers() {
        let mut config = valid_config();
        config.replay.workers = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_schema_prefix_rejects_quoting() {
        let mut config = valid_config();
        config.replay.schema_prefix = "play`ground".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_table_rejects_injection() {
        let mut config = valid_config();
        config.source.table = "stmts; drop table x".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_extra_filter() {
        let mut config = valid_config();
        config.replay.extra_filters = vec!["  ".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_source_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_456"));
    }
}
