//! Runtime configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no
//! file at all) yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rte_kernel::arithmetic::{parse_decimal, within, SCALE};
use rte_kernel::dialect::Dialect;
use rte_kernel::discovery::{locate, ExecutionContext, Located, DEFAULT_MAX_DEPTH};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Seconds between scheduled commits while a session runs.
    pub commit_interval_secs: u64,

    /// Scaled score needed for `passed` when the launch names none.
    pub mastery_threshold: String,

    /// Probe budget for host discovery.
    pub max_search_depth: usize,

    /// Dialect used by `on_ready` and tried first by discovery.
    pub preferred_dialect: Dialect,

    /// Vendor keys accepted by every session, in addition to the launch's.
    pub vendor_extensions: Vec<String>,

    /// Upper bound on waiting for in-flight pushes when a page is left.
    pub leaving_flush_timeout_ms: u64,

    /// Skip scheduled pushes whose content matches the last delivered one.
    pub skip_unchanged_scheduled_pushes: bool,

    pub cache: CacheConfig,
    pub backend: BackendConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    /// Journal frames kept before compacting to the newest one.
    pub compact_after_frames: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL; records go to `{endpoint}/progress` and `{endpoint}/completion`.
    /// Without one, records are only logged.
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per push, the first one included.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            commit_interval_secs: 30,
            mastery_threshold: "0.8".to_string(),
            max_search_depth: DEFAULT_MAX_DEPTH,
            preferred_dialect: Dialect::Current,
            vendor_extensions: Vec::new(),
            leaving_flush_timeout_ms: 2_000,
            skip_unchanged_scheduled_pushes: true,
            cache: CacheConfig::default(),
            backend: BackendConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(".rte-cache"),
            compact_after_frames: 64,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 10_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff before retry number `retry` (0-based), capped.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.min(30));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

impl RuntimeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load config from file, or return default if it is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Failed to load runtime config: {}", e),
            }
        }
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commit_interval_secs == 0 {
            return Err(invalid("commit_interval_secs", "must be positive"));
        }
        match parse_decimal(&self.mastery_threshold) {
            Some(value) if within(value, 0, SCALE) => {}
            _ => {
                return Err(invalid(
                    "mastery_threshold",
                    format!("'{}' is not a decimal in [0, 1]", self.mastery_threshold),
                ))
            }
        }
        if self.max_search_depth == 0 {
            return Err(invalid("max_search_depth", "must be positive"));
        }
        if self.cache.compact_after_frames == 0 {
            return Err(invalid("cache.compact_after_frames", "must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(invalid("retry.base_delay_ms", "exceeds retry.max_delay_ms"));
        }
        if let Some(endpoint) = &self.backend.endpoint {
            if let Err(e) = url::Url::parse(endpoint) {
                return Err(invalid("backend.endpoint", e.to_string()));
            }
        }
        Ok(())
    }

    /// Mastery threshold in fixed-point. Falls back to 0.8 if unparsable.
    pub fn mastery_threshold_fixed(&self) -> i64 {
        parse_decimal(&self.mastery_threshold).unwrap_or(8_000)
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_secs(self.commit_interval_secs)
    }

    pub fn leaving_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.leaving_flush_timeout_ms)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.timeout_ms)
    }

    /// Dialects to probe for, preferred one first.
    pub fn dialect_preference(&self) -> [Dialect; 2] {
        match self.preferred_dialect {
            Dialect::Current => [Dialect::Current, Dialect::Legacy],
            Dialect::Legacy => [Dialect::Legacy, Dialect::Current],
        }
    }

    /// Walk up from `start` looking for an exposed surface, bounded by
    /// `max_search_depth`.
    pub fn locate_surface<C: ExecutionContext>(&self, start: C) -> Option<Located<C::Surface>> {
        locate(start, self.max_search_depth, &self.dialect_preference())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.mastery_threshold_fixed(), 8_000);
        assert_eq!(config.commit_interval(), Duration::from_secs(30));
    }

    #[test]
    fn partial_document_overrides_named_fields() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            commit_interval_secs = 10
            mastery_threshold = "0.7"
            preferred_dialect = "legacy"

            [backend]
            endpoint = "https://lms.example/api/scorm"

            [retry]
            max_attempts = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.commit_interval_secs, 10);
        assert_eq!(config.mastery_threshold_fixed(), 7_000);
        assert_eq!(config.preferred_dialect, Dialect::Legacy);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert!(config.cache.enabled);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(RuntimeConfig::from_toml_str("commit_interval_secs = 0").is_err());
        assert!(RuntimeConfig::from_toml_str("mastery_threshold = \"1.5\"").is_err());
        assert!(RuntimeConfig::from_toml_str("[backend]\nendpoint = \"not a url\"").is_err());
        assert!(RuntimeConfig::from_toml_str("commit_interval_secs = \"soon\"").is_err());
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 500,
        };
        assert_eq!(retry.delay(0), Duration::from_millis(100));
        assert_eq!(retry.delay(1), Duration::from_millis(200));
        assert_eq!(retry.delay(2), Duration::from_millis(400));
        assert_eq!(retry.delay(3), Duration::from_millis(500));
        assert_eq!(retry.delay(40), Duration::from_millis(500));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = RuntimeConfig::load_or_default(Path::new("/nonexistent/rte.toml"));
        assert_eq!(config, RuntimeConfig::default());
    }

    /// Endless parent chain exposing one name at one depth.
    #[derive(Clone)]
    struct Chain {
        depth: usize,
        exposed_at: usize,
        name: &'static str,
    }

    impl ExecutionContext for Chain {
        type Surface = usize;

        fn lookup(&self, name: &str) -> Option<usize> {
            (self.depth == self.exposed_at && name == self.name).then_some(self.depth)
        }

        fn parent(&self) -> Option<Self> {
            Some(Chain {
                depth: self.depth + 1,
                ..self.clone()
            })
        }
    }

    #[test]
    fn locate_surface_uses_configured_budget() {
        let config = RuntimeConfig {
            max_search_depth: 3,
            preferred_dialect: Dialect::Legacy,
            ..RuntimeConfig::default()
        };
        let chain = |exposed_at, name| Chain {
            depth: 0,
            exposed_at,
            name,
        };

        let found = config
            .locate_surface(chain(2, Dialect::Legacy.api_name()))
            .unwrap();
        assert_eq!(found.depth, 2);
        assert_eq!(found.dialect, Dialect::Legacy);

        let found = config
            .locate_surface(chain(0, Dialect::Current.api_name()))
            .unwrap();
        assert_eq!(found.dialect, Dialect::Current);

        assert!(config
            .locate_surface(chain(3, Dialect::Legacy.api_name()))
            .is_none());
    }
}
