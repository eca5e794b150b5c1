//! Engine configuration.

use airsync_protocol::{ConflictPolicy, FilterType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Polling interval of the Ping wait loop.
    #[serde(with = "duration_secs")]
    pub ping_interval: Duration,
    /// Upper clamp on a requested Ping lifetime.
    #[serde(with = "duration_secs")]
    pub max_ping_lifetime: Duration,
    /// Window size used when the client does not request one.
    pub default_window_size: usize,
    /// Server cap on the number of changes sent in one round.
    pub max_window_size: usize,
    /// Conflict policy used when the client does not send one.
    pub default_conflict: ConflictPolicy,
    /// Narrowest filter the server lets a client request, if any.
    pub max_filter: Option<FilterType>,
    /// Whether the provisioning gate is enforced.
    pub provisioning: bool,
    /// Maximum number of search results returned.
    pub search_max_results: usize,
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            ping_interval: Duration::from_secs(5),
            max_ping_lifetime: Duration::from_secs(3540),
            default_window_size: 100,
            max_window_size: 512,
            default_conflict: ConflictPolicy::ServerWins,
            max_filter: None,
            provisioning: false,
            search_max_results: 100,
        }
    }

    /// Sets the Ping polling interval.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the maximum Ping lifetime.
    pub fn with_max_ping_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_ping_lifetime = lifetime;
        self
    }

    /// Sets the default window size.
    pub fn with_default_window_size(mut self, size: usize) -> Self {
        self.default_window_size = size;
        self
    }

    /// Sets the server window cap.
    pub fn with_max_window_size(mut self, size: usize) -> Self {
        self.max_window_size = size;
        self
    }

    /// Sets the default conflict policy.
    pub fn with_default_conflict(mut self, policy: ConflictPolicy) -> Self {
        self.default_conflict = policy;
        self
    }

    /// Limits how far back clients may synchronize.
    pub fn with_max_filter(mut self, filter: FilterType) -> Self {
        self.max_filter = Some(filter);
        self
    }

    /// Enables the provisioning gate.
    pub fn with_provisioning(mut self, enabled: bool) -> Self {
        self.provisioning = enabled;
        self
    }

    /// Sets the maximum number of search results.
    pub fn with_search_max_results(mut self, max: usize) -> Self {
        self.search_max_results = max;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.max_ping_lifetime, Duration::from_secs(3540));
        assert_eq!(config.default_window_size, 100);
        assert_eq!(config.max_window_size, 512);
        assert!(!config.provisioning);
    }

    #[test]
    fn config_builder() {
        let config = EngineConfig::new()
            .with_ping_interval(Duration::from_secs(1))
            .with_max_window_size(10)
            .with_default_conflict(ConflictPolicy::ClientWins)
            .with_provisioning(true);

        assert_eq!(config.ping_interval, Duration::from_secs(1));
        assert_eq!(config.max_window_size, 10);
        assert_eq!(config.default_conflict, ConflictPolicy::ClientWins);
        assert!(config.provisioning);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"ping_interval": 2, "provisioning": true}"#).unwrap();
        assert_eq!(config.ping_interval, Duration::from_secs(2));
        assert!(config.provisioning);
        assert_eq!(config.default_window_size, 100);
    }
}
