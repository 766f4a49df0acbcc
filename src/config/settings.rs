//! Harness settings
//!
//! Loaded from environment variables (after an optional `.env`) with
//! defaults matching the evaluation infrastructure.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default registry the submitted images live in
pub const DEFAULT_REGISTRY_URL: &str = "https://docker.synapse.org";

/// Default memory ceiling for a submitted container
pub const DEFAULT_MEMORY_LIMIT: &str = "7g";

/// Default execution budget in seconds (3 hours)
pub const DEFAULT_EXECUTION_TIMEOUT: u64 = 10_800;

/// Log files larger than this many bytes are cut down to their tail
pub const DEFAULT_LOG_SIZE_THRESHOLD: u64 = 50_000;

/// Number of lines kept when a log file is cut down
pub const DEFAULT_LOG_TAIL_LINES: usize = 5;

/// File a submission must write into `/output`
pub const DEFAULT_PREDICTIONS_FILE: &str = "predictions.csv";

/// Extra time the engine client allows beyond the execution budget
pub const ENGINE_TIMEOUT_GRACE: Duration = Duration::from_secs(300);

/// Container-side mount points
pub const CONTAINER_INPUT_DIR: &str = "/input";
pub const CONTAINER_OUTPUT_DIR: &str = "/output";

/// Main harness settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub log_level: String,

    /// Engine endpoint override; `None` uses the local defaults
    pub docker_host: Option<String>,
    pub registry_url: String,

    /// Memory ceiling in bytes
    pub memory_limit: i64,
    pub execution_timeout_seconds: u64,

    // Log handling
    pub log_dir: PathBuf,
    pub log_size_threshold: u64,
    pub log_tail_lines: usize,
    pub log_store_dir: PathBuf,

    pub predictions_file: String,
    pub results_file: PathBuf,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let memory = env_or_default("CONTAINER_MEMORY_LIMIT", DEFAULT_MEMORY_LIMIT);

        let settings = Self {
            log_level: env_or_default("LOG_LEVEL", "info"),

            docker_host: env::var("DOCKER_HOST").ok().filter(|h| !h.is_empty()),
            registry_url: env_or_default("REGISTRY_URL", DEFAULT_REGISTRY_URL),

            memory_limit: parse_memory_limit(&memory)
                .with_context(|| format!("Invalid CONTAINER_MEMORY_LIMIT value: {}", memory))?,
            execution_timeout_seconds: parse_env(
                "EXECUTION_TIMEOUT_SECONDS",
                DEFAULT_EXECUTION_TIMEOUT,
            )?,

            log_dir: PathBuf::from(env_or_default("LOG_DIR", ".")),
            log_size_threshold: parse_env("LOG_SIZE_THRESHOLD_BYTES", DEFAULT_LOG_SIZE_THRESHOLD)?,
            log_tail_lines: parse_env("LOG_TAIL_LINES", DEFAULT_LOG_TAIL_LINES)?,
            log_store_dir: PathBuf::from(env_or_default("LOG_STORE_DIR", "submission-logs")),

            predictions_file: env_or_default("PREDICTIONS_FILE", DEFAULT_PREDICTIONS_FILE),
            results_file: PathBuf::from(env_or_default("RESULTS_FILE", "results.json")),
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.execution_timeout_seconds == 0 {
            anyhow::bail!("Execution timeout must be > 0");
        }
        if self.log_tail_lines == 0 {
            anyhow::bail!("Log tail lines must be > 0");
        }
        if self.memory_limit <= 0 {
            anyhow::bail!("Container memory limit must be > 0");
        }
        if self.predictions_file.is_empty() || self.predictions_file.contains('/') {
            anyhow::bail!("Predictions file must be a bare file name");
        }
        Ok(())
    }

    /// Execution budget as a `Duration`
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_seconds)
    }

    /// Request timeout for the engine client: the budget plus a grace period
    pub fn engine_request_timeout(&self) -> Duration {
        self.execution_timeout().saturating_add(ENGINE_TIMEOUT_GRACE)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            docker_host: None,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            memory_limit: 7 * 1024 * 1024 * 1024,
            execution_timeout_seconds: DEFAULT_EXECUTION_TIMEOUT,
            log_dir: PathBuf::from("."),
            log_size_threshold: DEFAULT_LOG_SIZE_THRESHOLD,
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
            log_store_dir: PathBuf::from("submission-logs"),
            predictions_file: DEFAULT_PREDICTIONS_FILE.to_string(),
            results_file: PathBuf::from("results.json"),
        }
    }
}

/// Parse a Docker-style memory string (`512m`, `7g`, `1024`) into bytes
pub fn parse_memory_limit(value: &str) -> Result<i64> {
    let value = value.trim().to_ascii_lowercase();
    let (digits, multiplier) = match value.chars().last() {
        Some('b') => (&value[..value.len() - 1], 1),
        Some('k') => (&value[..value.len() - 1], 1024),
        Some('m') => (&value[..value.len() - 1], 1024 * 1024),
        Some('g') => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        Some(c) if c.is_ascii_digit() => (value.as_str(), 1),
        _ => anyhow::bail!("unrecognized memory size"),
    };

    let amount: i64 = digits.parse().context("memory size is not a number")?;
    amount
        .checked_mul(multiplier)
        .context("memory size overflows")
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => parse_setting(key, &value),
        Err(_) => Ok(default),
    }
}

fn parse_setting<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))
}

/// Helper function to get environment variable with default
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.execution_timeout(), Duration::from_secs(10_800));
        assert_eq!(settings.log_tail_lines, 5);
        assert_eq!(settings.log_size_threshold, 50_000);
        assert_eq!(settings.predictions_file, "predictions.csv");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_memory_limit() {
        assert_eq!(parse_memory_limit("7g").unwrap(), 7 * 1024 * 1024 * 1024);
        assert_eq!(parse_memory_limit("256m").unwrap(), 256 * 1024 * 1024);
        assert_eq!(parse_memory_limit("64K").unwrap(), 64 * 1024);
        assert_eq!(parse_memory_limit("1024").unwrap(), 1024);
        assert!(parse_memory_limit("lots").is_err());
        assert!(parse_memory_limit("").is_err());
    }

    #[test]
    fn test_malformed_numeric_setting_is_an_error() {
        let err = parse_setting::<u64>("LOG_SIZE_THRESHOLD_BYTES", "50kb").unwrap_err();
        assert_eq!(err.to_string(), "Invalid LOG_SIZE_THRESHOLD_BYTES value: 50kb");
        assert!(parse_setting::<usize>("LOG_TAIL_LINES", "-5").is_err());
        assert_eq!(parse_setting::<usize>("LOG_TAIL_LINES", " 8 ").unwrap(), 8);
    }

    #[test]
    fn test_unset_numeric_setting_uses_default() {
        let value: u64 = parse_env("MODEL_EVAL_HARNESS_UNSET_FOR_TEST", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_engine_request_timeout_saturates() {
        let settings = Settings {
            execution_timeout_seconds: u64::MAX,
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
        assert_eq!(settings.engine_request_timeout(), Duration::MAX);

        assert_eq!(
            Settings::default().engine_request_timeout(),
            Duration::from_secs(10_800 + 300)
        );
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let settings = Settings {
            execution_timeout_seconds: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nested_predictions_path() {
        let settings = Settings {
            predictions_file: "sub/predictions.csv".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
