use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::filter::TimeWindowPolicy;

/// `[catalog]` section of the service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Query endpoint of the upstream catalog.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Window used when a query omits its start or end.
    #[serde(default = "default_window_days")]
    pub default_window_days: u32,
    /// User agent sent upstream.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            default_window_days: default_window_days(),
            user_agent: default_user_agent(),
        }
    }
}

impl CatalogConfig {
    /// Missing-time policy derived from `default_window_days`.
    #[must_use]
    pub fn window_policy(&self) -> TimeWindowPolicy {
        TimeWindowPolicy::days(self.default_window_days)
    }

    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_base_url() -> String {
    "https://earthquake.usgs.gov/fdsnws/event/1/query".into()
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_window_days() -> u32 {
    7
}

fn default_user_agent() -> String {
    "quakecast/0.1".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fills_missing_fields_with_defaults() {
        let config: CatalogConfig =
            serde_json::from_value(json!({ "timeout_ms": 2500, "default_window_days": 30 })).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        assert_eq!(config.window_policy(), TimeWindowPolicy::days(30));
        assert_eq!(config.base_url, CatalogConfig::default().base_url);
    }
}
