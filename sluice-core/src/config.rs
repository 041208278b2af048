//! Centralized configuration for Sluice.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

use crate::{Result, SluiceError};

/// Central configuration for all Sluice components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct SluiceConfig {
    pub session: SessionConfig,
    pub simulation: SimulationConfig,
}

/// Per-session pump configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Queue depth at which a warning is logged. The queue itself is
    /// unbounded; crossing this only reports a stalled or slow sink.
    pub queue_warn_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_warn_depth: 256,
        }
    }
}

/// Simulated source and sink behaviour for testing and development.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Deterministic seed for reproducible simulations
    pub deterministic_seed: Option<u64>,
    /// Segments emitted by the simulated source
    pub segment_count: usize,
    /// Smallest simulated segment payload in bytes
    pub min_segment_size: usize,
    /// Largest simulated segment payload in bytes
    pub max_segment_size: usize,
    /// Delay before the simulated sink reports ready
    pub sink_open_delay: Duration,
    /// Time the simulated sink takes to accept one append
    pub append_latency: Duration,
    /// Gap between segments emitted by the simulated source
    pub segment_interval: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            deterministic_seed: None,
            segment_count: 60,
            min_segment_size: 16 * 1024,  // 16 KiB
            max_segment_size: 256 * 1024, // 256 KiB
            sink_open_delay: Duration::from_millis(250),
            append_latency: Duration::from_millis(20),
            segment_interval: Duration::from_millis(33),
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for deterministic testing.
    pub fn deterministic_testing() -> Self {
        Self {
            deterministic_seed: Some(42), // Fixed seed for reproducible tests
            segment_count: 16,
            min_segment_size: 64,
            max_segment_size: 512,
            sink_open_delay: Duration::from_millis(5),
            append_latency: Duration::from_millis(1),
            segment_interval: Duration::ZERO,
        }
    }

    /// Creates a configuration with a sink slower than the source.
    pub fn slow_sink() -> Self {
        Self {
            sink_open_delay: Duration::from_secs(1),
            append_latency: Duration::from_millis(100),
            ..Default::default()
        }
    }
}

impl SluiceConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(depth) = std::env::var("SLUICE_QUEUE_WARN_DEPTH") {
            if let Ok(depth) = depth.parse::<usize>() {
                config.session.queue_warn_depth = depth;
            }
        }

        if let Ok(seed) = std::env::var("SLUICE_SIMULATION_SEED") {
            if let Ok(seed_value) = seed.parse::<u64>() {
                config.simulation.deterministic_seed = Some(seed_value);
            }
        }

        if let Some(delay) = env_millis("SLUICE_SINK_OPEN_DELAY_MS") {
            config.simulation.sink_open_delay = delay;
        }

        if let Some(latency) = env_millis("SLUICE_APPEND_LATENCY_MS") {
            config.simulation.append_latency = latency;
        }

        if let Some(interval) = env_millis("SLUICE_SEGMENT_INTERVAL_MS") {
            config.simulation.segment_interval = interval;
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            simulation: SimulationConfig::deterministic_testing(),
            ..Default::default()
        }
    }

    /// Creates a configuration for development against a slow sink.
    pub fn for_development() -> Self {
        Self {
            simulation: SimulationConfig::slow_sink(),
            ..Default::default()
        }
    }

    /// Rejects settings no session can run with.
    ///
    /// # Errors
    ///
    /// - `SluiceError::Configuration` - Zero warn depth or inverted segment size range
    pub fn validate(&self) -> Result<()> {
        if self.session.queue_warn_depth == 0 {
            return Err(SluiceError::Configuration {
                reason: "queue_warn_depth must be at least 1".to_string(),
            });
        }

        if self.simulation.min_segment_size > self.simulation.max_segment_size {
            return Err(SluiceError::Configuration {
                reason: format!(
                    "min_segment_size {} exceeds max_segment_size {}",
                    self.simulation.min_segment_size, self.simulation.max_segment_size
                ),
            });
        }

        Ok(())
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = SluiceConfig::default();

        assert_eq!(config.session.queue_warn_depth, 256);
        assert_eq!(config.simulation.deterministic_seed, None);
        assert_eq!(config.simulation.segment_count, 60);
        assert_eq!(config.simulation.append_latency, Duration::from_millis(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_presets() {
        let testing_config = SluiceConfig::for_testing();
        assert_eq!(testing_config.simulation.deterministic_seed, Some(42));
        assert_eq!(testing_config.simulation.segment_interval, Duration::ZERO);

        let dev_config = SluiceConfig::for_development();
        assert!(dev_config.simulation.append_latency > testing_config.simulation.append_latency);
        assert!(dev_config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SluiceConfig::default();
        config.session.queue_warn_depth = 0;
        assert!(matches!(
            config.validate(),
            Err(SluiceError::Configuration { .. })
        ));

        let mut config = SluiceConfig::default();
        config.simulation.min_segment_size = 10;
        config.simulation.max_segment_size = 5;
        assert!(matches!(
            config.validate(),
            Err(SluiceError::Configuration { .. })
        ));
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("SLUICE_QUEUE_WARN_DEPTH", "8");
            std::env::set_var("SLUICE_SIMULATION_SEED", "12345");
            std::env::set_var("SLUICE_SINK_OPEN_DELAY_MS", "7");
            std::env::set_var("SLUICE_APPEND_LATENCY_MS", "3");
            std::env::set_var("SLUICE_SEGMENT_INTERVAL_MS", "not-a-number");
        }

        let config = SluiceConfig::from_env();

        assert_eq!(config.session.queue_warn_depth, 8);
        assert_eq!(config.simulation.deterministic_seed, Some(12345));
        assert_eq!(config.simulation.sink_open_delay, Duration::from_millis(7));
        assert_eq!(config.simulation.append_latency, Duration::from_millis(3));
        assert_eq!(
            config.simulation.segment_interval,
            SimulationConfig::default().segment_interval
        );

        // Cleanup
        unsafe {
            std::env::remove_var("SLUICE_QUEUE_WARN_DEPTH");
            std::env::remove_var("SLUICE_SIMULATION_SEED");
            std::env::remove_var("SLUICE_SINK_OPEN_DELAY_MS");
            std::env::remove_var("SLUICE_APPEND_LATENCY_MS");
            std::env::remove_var("SLUICE_SEGMENT_INTERVAL_MS");
        }
    }
}
