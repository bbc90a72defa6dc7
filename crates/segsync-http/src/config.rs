use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Throttled download target: 2096 bytes per millisecond, just under 16 Mbit/s.
pub const DEFAULT_TARGET_BYTES_PER_MS: u64 = 2096;
pub const DEFAULT_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Tunables for [`HttpFetcher`](crate::HttpFetcher).
///
/// Only connection establishment is bounded by a timeout; transfers run
/// as long as they need and are stopped through cancellation instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    pub connect_timeout_ms: u64,
    /// Granularity for writes, progress reports, cancellation checks and
    /// throttling.
    pub chunk_size: usize,
    /// Throughput cap for throttled downloads.
    pub target_bytes_per_ms: u64,
    pub user_agent: String,
}

impl DownloaderConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Minimum wall-clock time a throttled transfer of `bytes` may take.
    pub fn throttle_budget(&self, bytes: u64) -> Duration {
        Duration::from_millis(bytes / self.target_bytes_per_ms.max(1))
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            target_bytes_per_ms: DEFAULT_TARGET_BYTES_PER_MS,
            user_agent: concat!("segsync/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DownloaderConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.target_bytes_per_ms, 2096);
    }

    #[test]
    fn throttle_budget_is_bytes_over_rate() {
        let config = DownloaderConfig {
            target_bytes_per_ms: 100,
            ..DownloaderConfig::default()
        };
        assert_eq!(config.throttle_budget(10_000), Duration::from_millis(100));
        assert_eq!(config.throttle_budget(99), Duration::ZERO);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: DownloaderConfig = toml::from_str("chunk_size = 512").unwrap();
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.target_bytes_per_ms, DEFAULT_TARGET_BYTES_PER_MS);
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
    }
}
