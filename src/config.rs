//! Runtime configuration derived from the loaded TOML model

use std::time::Duration;

use crate::models::config::GrasshopperConfig;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    request_timeout: Duration,
    pub debounce: Duration,
    pub prefix_bytes: usize,
    pub suffix_bytes: usize,
}

impl RuntimeConfig {
    const MIN_REQUEST_TIMEOUT: Duration = Duration::from_millis(500);
    const MAX_COMPLETION_TIMEOUT: Duration = Duration::from_secs(8);
    const COMPLETION_SHARE: f64 = 0.8;

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Deadline for one backend call, always tighter than the request timeout
    pub fn completion_timeout(&self) -> Duration {
        self.request_timeout
            .mul_f64(Self::COMPLETION_SHARE)
            .min(Self::MAX_COMPLETION_TIMEOUT)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from(&GrasshopperConfig::default())
    }
}

impl From<&GrasshopperConfig> for RuntimeConfig {
    fn from(config: &GrasshopperConfig) -> Self {
        let requested = Duration::from_millis(config.timeout_ms);
        if requested < Self::MIN_REQUEST_TIMEOUT {
            tracing::warn!(
                "Configured timeout {:?} is below {:?}, clamping",
                requested,
                Self::MIN_REQUEST_TIMEOUT
            );
        }

        Self {
            request_timeout: requested.max(Self::MIN_REQUEST_TIMEOUT),
            debounce: Duration::from_millis(config.debounce_ms),
            prefix_bytes: config.context.prefix_bytes,
            suffix_bytes: config.context.suffix_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_timeout(timeout_ms: u64) -> RuntimeConfig {
        let config = GrasshopperConfig {
            timeout_ms,
            ..Default::default()
        };
        RuntimeConfig::from(&config)
    }

    #[test]
    fn test_completion_timeout_calculation() {
        // Default 10s: 0.8 * 10s = 8s, at the cap
        assert_eq!(
            RuntimeConfig::default().completion_timeout(),
            Duration::from_secs(8)
        );

        // 5s: 0.8 * 5s = 4s
        assert_eq!(
            with_timeout(5_000).completion_timeout(),
            Duration::from_secs(4)
        );

        // 60s: capped at 8s
        assert_eq!(
            with_timeout(60_000).completion_timeout(),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn test_completion_timeout_is_tighter() {
        for ms in [500, 1_000, 7_000, 10_000, 30_000] {
            let config = with_timeout(ms);
            assert!(config.completion_timeout() < config.request_timeout());
        }
    }

    #[test]
    fn test_minimum_request_timeout() {
        let config = with_timeout(50);
        assert_eq!(config.request_timeout(), Duration::from_millis(500));
        assert_eq!(config.completion_timeout(), Duration::from_millis(400));
    }

    #[test]
    fn test_context_limits_propagate() {
        let mut model = GrasshopperConfig::default();
        model.context.prefix_bytes = 100;
        model.context.suffix_bytes = 10;
        model.debounce_ms = 50;

        let config = RuntimeConfig::from(&model);
        assert_eq!(config.prefix_bytes, 100);
        assert_eq!(config.suffix_bytes, 10);
        assert_eq!(config.debounce, Duration::from_millis(50));
    }
}
