//! Driver configuration loaded from environment variables.

use std::time::Duration;

use crate::backoff::RetryPolicy;

/// Relay configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `OUTBOX_DESTINATION`: bus destination name (default: `"messages"`)
/// - `OUTBOX_CONFIRM_TIMEOUT_MS`: confirmation wait bound (default: `5000`)
/// - `OUTBOX_SCAN_INTERVAL_MS`: pause between scan passes (default: `1000`)
/// - `OUTBOX_STALE_AFTER_MS`: age before a `Publishing` record is
///   reconciled (default: `30000`)
/// - `OUTBOX_WORKERS`: concurrent worker tasks (default: `1`)
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub destination: String,
    pub confirm_timeout: Duration,
    pub scan_interval: Duration,
    pub stale_after: Duration,
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl RelayConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            destination: std::env::var("OUTBOX_DESTINATION")
                .unwrap_or(defaults.destination),
            confirm_timeout: env_millis("OUTBOX_CONFIRM_TIMEOUT_MS")
                .unwrap_or(defaults.confirm_timeout),
            scan_interval: env_millis("OUTBOX_SCAN_INTERVAL_MS")
                .unwrap_or(defaults.scan_interval),
            stale_after: env_millis("OUTBOX_STALE_AFTER_MS").unwrap_or(defaults.stale_after),
            workers: std::env::var("OUTBOX_WORKERS")
                .ok()
                .and_then(|w| w.parse().ok())
                .unwrap_or(defaults.workers),
            retry: defaults.retry,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            destination: "messages".to_string(),
            confirm_timeout: Duration::from_secs(5),
            scan_interval: Duration::from_secs(1),
            stale_after: Duration::from_secs(30),
            workers: 1,
            retry: RetryPolicy::default(),
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = RelayConfig::default();
        assert_eq!(config.destination, "messages");
        assert_eq!(config.confirm_timeout, Duration::from_secs(5));
        assert_eq!(config.scan_interval, Duration::from_secs(1));
        assert_eq!(config.stale_after, Duration::from_secs(30));
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_env_millis_unset_returns_none() {
        assert_eq!(env_millis("OUTBOX_TEST_UNSET_KEY"), None);
    }
}
