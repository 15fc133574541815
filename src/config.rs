//! Runtime configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::StalePolicy;
use crate::eval::AvgMode;

#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Seconds between reconcile cycles
    pub reconcile_interval_secs: u64,
    /// Handling of assignments whose trigger is no longer reachable
    pub stale_policy: StalePolicy,
    /// Divisor policy handed to the expression engine for `avg`
    pub avg_mode: AvgMode,
    /// JSON seed for the in-memory store
    pub seed_path: Option<PathBuf>,
    /// Budget for a single store read
    pub read_timeout: Duration,
    /// Budget for a single store write
    pub write_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: 60,
            stale_policy: StalePolicy::Report,
            avg_mode: AvgMode::Window,
            seed_path: None,
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl CoreConfig {
    /// Create a config from environment variables
    /// FLOWKEEPER_RECONCILE_INTERVAL_SECS=60
    /// FLOWKEEPER_REMOVE_STALE_ASSIGNMENTS=false
    /// FLOWKEEPER_AVG_MODE=window|full-length
    /// FLOWKEEPER_SEED_PATH=/etc/flowkeeper/seed.json
    /// FLOWKEEPER_READ_TIMEOUT_SECS=15
    /// FLOWKEEPER_WRITE_TIMEOUT_SECS=30
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparseable values keep the default
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let stale_policy = match lookup("FLOWKEEPER_REMOVE_STALE_ASSIGNMENTS") {
            Some(v) if v == "true" || v == "1" => StalePolicy::Remove,
            _ => StalePolicy::Report,
        };

        Self {
            reconcile_interval_secs: parse_or(
                &lookup,
                "FLOWKEEPER_RECONCILE_INTERVAL_SECS",
                defaults.reconcile_interval_secs,
            ),
            stale_policy,
            avg_mode: parse_or(&lookup, "FLOWKEEPER_AVG_MODE", defaults.avg_mode),
            seed_path: lookup("FLOWKEEPER_SEED_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            read_timeout: Duration::from_secs(parse_or(
                &lookup,
                "FLOWKEEPER_READ_TIMEOUT_SECS",
                defaults.read_timeout.as_secs(),
            )),
            write_timeout: Duration::from_secs(parse_or(
                &lookup,
                "FLOWKEEPER_WRITE_TIMEOUT_SECS",
                defaults.write_timeout.as_secs(),
            )),
        }
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable setting");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[]));
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.reconcile_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("FLOWKEEPER_RECONCILE_INTERVAL_SECS", "5"),
            ("FLOWKEEPER_REMOVE_STALE_ASSIGNMENTS", "1"),
            ("FLOWKEEPER_AVG_MODE", "full-length"),
            ("FLOWKEEPER_SEED_PATH", "/tmp/seed.json"),
            ("FLOWKEEPER_READ_TIMEOUT_SECS", "3"),
        ]));

        assert_eq!(config.reconcile_interval_secs, 5);
        assert_eq!(config.stale_policy, StalePolicy::Remove);
        assert_eq!(config.avg_mode, AvgMode::FullLength);
        assert_eq!(config.seed_path, Some(PathBuf::from("/tmp/seed.json")));
        assert_eq!(config.read_timeout, Duration::from_secs(3));
        assert_eq!(config.write_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("FLOWKEEPER_RECONCILE_INTERVAL_SECS", "soon"),
            ("FLOWKEEPER_AVG_MODE", "median"),
            ("FLOWKEEPER_REMOVE_STALE_ASSIGNMENTS", "yes please"),
        ]));

        assert_eq!(config.reconcile_interval_secs, 60);
        assert_eq!(config.avg_mode, AvgMode::Window);
        assert_eq!(config.stale_policy, StalePolicy::Report);
    }

    #[test]
    fn test_interval_never_zero() {
        let config = CoreConfig::from_lookup(lookup(&[("FLOWKEEPER_RECONCILE_INTERVAL_SECS", "0")]));
        assert_eq!(config.reconcile_interval(), Duration::from_secs(1));
    }
}
