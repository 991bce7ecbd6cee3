//! Gateway configuration.

use std::time::Duration;

/// Tunables for the gateway. [`Default`] gives the recommended production
/// values; the CLI overrides individual fields.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP listen address.
    pub listen_addr: String,
    /// Target duration of each emitted segment.
    pub segment_interval: Duration,
    /// Playlist sliding-window size in segments.
    pub playlist_window: usize,
    /// Playlist ring capacity (initial allocation).
    pub playlist_capacity: usize,
    /// How long finished segments stay retrievable.
    pub segment_ttl: Duration,
    /// Idle time after which a session is evicted.
    pub registry_ttl: Duration,
    /// How often expired registry entries are swept out.
    pub sweep_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:1323".to_string(),
            segment_interval: Duration::from_secs(1),
            playlist_window: 5,
            playlist_capacity: 10,
            segment_ttl: Duration::from_secs(60),
            registry_ttl: Duration::from_secs(3 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.segment_interval, Duration::from_secs(1));
        assert_eq!(config.playlist_window, 5);
        // the playlist must never outlive its segments: the whole window has
        // to fit well inside the segment TTL
        let window_span = config.segment_interval * config.playlist_window as u32;
        assert!(window_span * 4 <= config.segment_ttl);
    }
}
