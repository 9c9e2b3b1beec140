//! Application configuration loaded from environment variables.

use std::time::Duration;

use checkout::CheckoutConfig;
use workers::WorkerConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Process configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `CHARGE_APPROVAL_RATE`: gateway approval probability (default: `0.95`)
/// - `CHARGE_DELAY_MS`: simulated gateway latency (default: `1500`)
/// - `SESSION_HEARTBEAT_SECS`: session heartbeat interval (default: `30`)
/// - `SESSION_IDLE_TIMEOUT_SECS`: idle logout, `0` disables (default: `0`)
/// - `SHUTDOWN_GRACE_MS`: per-worker join timeout at exit (default: `5000`)
/// - `METRICS_DUMP`: log the Prometheus exposition at exit (default: `false`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub charge_approval_rate: f64,
    pub charge_delay: Duration,
    pub session_heartbeat: Duration,
    pub session_idle_timeout: Option<Duration>,
    pub shutdown_grace: Duration,
    pub metrics_dump: bool,
}

fn parsed<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn flag(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::trim),
        Some("1" | "true" | "TRUE" | "yes" | "on")
    )
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key lookup. Unparseable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let idle_secs: u64 = parsed(lookup("SESSION_IDLE_TIMEOUT_SECS"), 0);

        Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref().map(str::trim) {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            charge_approval_rate: parsed::<f64>(
                lookup("CHARGE_APPROVAL_RATE"),
                defaults.charge_approval_rate,
            )
            .clamp(0.0, 1.0),
            charge_delay: Duration::from_millis(parsed(lookup("CHARGE_DELAY_MS"), 1500)),
            session_heartbeat: Duration::from_secs(
                parsed::<u64>(lookup("SESSION_HEARTBEAT_SECS"), 30).max(1),
            ),
            session_idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            shutdown_grace: Duration::from_millis(parsed(lookup("SHUTDOWN_GRACE_MS"), 5000)),
            metrics_dump: flag(lookup("METRICS_DUMP")),
        }
    }

    /// Worker tunables derived from this configuration.
    pub fn workers(&self) -> WorkerConfig {
        WorkerConfig {
            charge_approval_rate: self.charge_approval_rate,
            charge_delay: self.charge_delay,
            session_heartbeat: self.session_heartbeat,
            session_idle_timeout: self.session_idle_timeout,
            ..WorkerConfig::default()
        }
    }

    pub fn checkout(&self) -> CheckoutConfig {
        CheckoutConfig::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            charge_approval_rate: 0.95,
            charge_delay: Duration::from_millis(1500),
            session_heartbeat: Duration::from_secs(30),
            session_idle_timeout: None,
            shutdown_grace: Duration::from_millis(5000),
            metrics_dump: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serial_test::serial;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = config_from(&[]);
        assert_eq!(config, Config::default());
        assert_eq!(config.database_url, None);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.charge_delay, Duration::from_millis(1500));
        assert_eq!(config.session_idle_timeout, None);
        assert!(!config.metrics_dump);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/checkout"),
            ("LOG_FORMAT", "JSON"),
            ("CHARGE_APPROVAL_RATE", "0.5"),
            ("CHARGE_DELAY_MS", "10"),
            ("SESSION_IDLE_TIMEOUT_SECS", "300"),
            ("SHUTDOWN_GRACE_MS", "250"),
            ("METRICS_DUMP", "true"),
        ]);

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/checkout"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.charge_approval_rate, 0.5);
        assert_eq!(config.charge_delay, Duration::from_millis(10));
        assert_eq!(config.session_idle_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.shutdown_grace, Duration::from_millis(250));
        assert!(config.metrics_dump);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[
            ("CHARGE_APPROVAL_RATE", "often"),
            ("CHARGE_DELAY_MS", "-5"),
            ("DATABASE_URL", "  "),
            ("SESSION_HEARTBEAT_SECS", "0"),
        ]);
        assert_eq!(config.charge_approval_rate, 0.95);
        assert_eq!(config.charge_delay, Duration::from_millis(1500));
        assert_eq!(config.database_url, None);
        assert_eq!(config.session_heartbeat, Duration::from_secs(1));
    }

    #[test]
    fn test_approval_rate_is_clamped() {
        assert_eq!(config_from(&[("CHARGE_APPROVAL_RATE", "3")]).charge_approval_rate, 1.0);
    }

    #[test]
    fn test_worker_config() {
        let config = config_from(&[("CHARGE_DELAY_MS", "0"), ("SESSION_IDLE_TIMEOUT_SECS", "5")]);
        let workers = config.workers();
        assert_eq!(workers.charge_delay, Duration::ZERO);
        assert_eq!(workers.session_idle_timeout, Some(Duration::from_secs(5)));
        assert_eq!(
            workers.return_processing_delay,
            WorkerConfig::default().return_processing_delay
        );
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // SAFETY: environment mutation is confined to #[serial] tests.
        unsafe {
            std::env::set_var("CHARGE_DELAY_MS", "42");
            std::env::set_var("METRICS_DUMP", "1");
        }
        let config = Config::from_env();
        unsafe {
            std::env::remove_var("CHARGE_DELAY_MS");
            std::env::remove_var("METRICS_DUMP");
        }

        assert_eq!(config.charge_delay, Duration::from_millis(42));
        assert!(config.metrics_dump);
    }
}
