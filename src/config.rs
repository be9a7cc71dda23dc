//! Engine configuration
//!
//! Loaded from `quarry.toml` or built in code; every field has a default.

use quarry_core::{CoercionOptions, Dialect, FalseEncoding, QuarryError, ResolveOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "quarry.toml";

// ============================================================================
// Retry
// ============================================================================

/// Transient-error retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Backoff before the first retry; doubles per attempt. `0` retries at once.
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Case-insensitive message fragments marking an error as transient
    pub signatures: Vec<String>,
    /// SQLSTATE / driver codes marking an error as transient
    pub codes: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 0,
            max_delay_ms: 1000,
            signatures: vec!["deadlock".into()],
            codes: vec!["40P01".into(), "40001".into()],
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.base_delay_ms == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub dialect: Dialect,
    /// Upper bound for any page size; models may lower or raise it
    pub max_limit: u64,
    /// Page size when none is requested
    pub default_limit: u64,
    pub false_encoding: FalseEncoding,
    /// Unknown include aliases fail instead of being ignored
    pub strict_includes: bool,
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::PostgreSQL,
            max_limit: 200,
            default_limit: 50,
            false_encoding: FalseEncoding::Zero,
            strict_includes: false,
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the default config file
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load from specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.into())
            } else {
                ConfigError::Io(path.into(), e)
            }
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(path.into(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::ParseStr)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_limit == 0 {
            return Err(ConfigError::Invalid("max_limit must be at least 1".into()));
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigError::Invalid(format!(
                "default_limit ({}) exceeds max_limit ({})",
                self.default_limit, self.max_limit
            )));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.max_delay_ms is below retry.base_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn coercion(&self) -> CoercionOptions {
        CoercionOptions {
            false_encoding: self.false_encoding,
        }
    }

    pub(crate) fn resolve(&self) -> ResolveOptions {
        ResolveOptions {
            strict_includes: self.strict_includes,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("failed to parse config: {0}")]
    ParseStr(#[source] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for QuarryError {
    fn from(err: ConfigError) -> Self {
        QuarryError::Config(err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.max_limit, 200);
        assert_eq!(cfg.retry.max_retries, 3);
    }

    #[test]
    fn full_file() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            dialect = "mysql"
            max_limit = 100
            default_limit = 20
            false_encoding = "legacy-null"
            strict_includes = true

            [retry]
            max_retries = 5
            base_delay_ms = 10
            signatures = ["deadlock", "lock wait timeout"]
            codes = ["ER_LOCK_DEADLOCK"]
        "#,
        )
        .unwrap();
        assert_eq!(cfg.dialect, Dialect::MySQL);
        assert_eq!(cfg.false_encoding, FalseEncoding::LegacyNull);
        assert!(cfg.strict_includes);
        assert_eq!(cfg.retry.max_retries, 5);
        assert_eq!(cfg.retry.max_delay_ms, 1000);
        assert_eq!(cfg.retry.signatures.len(), 2);
    }

    #[test]
    fn postgres_alias() {
        let cfg = EngineConfig::from_toml_str(r#"dialect = "postgres""#).unwrap();
        assert_eq!(cfg.dialect, Dialect::PostgreSQL);
    }

    #[test]
    fn limits_are_validated() {
        let err = EngineConfig::from_toml_str("max_limit = 10\ndefault_limit = 50").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(EngineConfig::from_toml_str("max_limit = 0\ndefault_limit = 0").is_err());
        assert!(EngineConfig::from_toml_str("unknown = 1").is_err());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let retry = RetryConfig {
            base_delay_ms: 100,
            max_delay_ms: 350,
            ..RetryConfig::default()
        };
        assert_eq!(retry.delay(1), Duration::from_millis(100));
        assert_eq!(retry.delay(2), Duration::from_millis(200));
        assert_eq!(retry.delay(3), Duration::from_millis(350));
        assert_eq!(RetryConfig::default().delay(2), Duration::ZERO);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_limit = 25").unwrap();
        let cfg = EngineConfig::load_from(file.path()).unwrap();
        assert_eq!(cfg.default_limit, 25);

        let missing = EngineConfig::load_from(Path::new("/nonexistent/quarry.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::NotFound(_)));
    }
}
