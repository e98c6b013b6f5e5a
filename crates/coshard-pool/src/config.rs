//! Pool configuration types

use std::time::Duration;

use coshard_config::PoolSettings;
use coshard_core::{CoshardError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for one data source pool
///
/// Controls pool sizing, acquire deadline, idle eviction and reaper cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Warm floor: connections the reaper never evicts below
    min_size: usize,
    /// Upper bound on live connections, borrowed or idle
    max_size: usize,
    /// Deadline for acquire when the pool is exhausted, `None` waits forever
    acquire_timeout_ms: Option<u64>,
    /// Idle time after which a connection above the warm floor is evicted
    idle_timeout_ms: u64,
    /// Period of the idle reaper
    reap_interval_ms: u64,
    /// Health-check idle connections before handing them out
    test_on_acquire: bool,
}

impl PoolConfig {
    /// Create a new pool configuration with the given min and max sizes
    ///
    /// Bounds are checked by [`PoolConfig::validate`] when the pool starts.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self {
            min_size,
            max_size,
            acquire_timeout_ms: Some(30_000), // 30 seconds default
            idle_timeout_ms: 60_000,          // 1 minute default
            reap_interval_ms: 60_000,         // 1 minute default
            test_on_acquire: false,
        }
    }

    /// Build a pool configuration from a data node's bounds and the shared settings
    pub fn from_settings(min_size: usize, max_size: usize, settings: &PoolSettings) -> Self {
        Self::new(min_size, max_size)
            .with_acquire_timeout_ms(settings.acquire_timeout_ms)
            .with_idle_timeout_ms(settings.idle_timeout_ms)
            .with_reap_interval_ms(settings.reap_interval_ms)
            .with_test_on_acquire(settings.test_on_acquire)
    }

    /// Set the acquire timeout in milliseconds; 0 waits without a deadline,
    /// as `acquire_timeout_ms = 0` does in the config file
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = (timeout_ms > 0).then_some(timeout_ms);
        self
    }

    /// Wait for a connection without a deadline
    pub fn without_acquire_timeout(mut self) -> Self {
        self.acquire_timeout_ms = None;
        self
    }

    /// Set the idle timeout in milliseconds
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    /// Set the reaper interval in milliseconds
    pub fn with_reap_interval_ms(mut self, interval_ms: u64) -> Self {
        self.reap_interval_ms = interval_ms;
        self
    }

    /// Enable/disable the health check on acquire
    pub fn with_test_on_acquire(mut self, enabled: bool) -> Self {
        self.test_on_acquire = enabled;
        self
    }

    /// Get the minimum pool size
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the acquire timeout as a Duration if set
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }

    /// Get the idle timeout as a Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Get the reaper interval as a Duration
    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    pub fn test_on_acquire(&self) -> bool {
        self.test_on_acquire
    }

    /// Check the bounds before a pool is built from this configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_size < 1 {
            return Err(CoshardError::Configuration(format!(
                "max_size must be at least 1, got {}",
                self.max_size
            )));
        }
        if self.min_size > self.max_size {
            return Err(CoshardError::Configuration(format!(
                "min_size ({}) cannot exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.reap_interval_ms == 0 {
            return Err(CoshardError::Configuration(
                "reap_interval must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    /// Defaults:
    /// - min_size: 1
    /// - max_size: 10
    /// - acquire_timeout: 30 seconds
    /// - idle_timeout: 1 minute
    /// - reap_interval: 1 minute
    fn default() -> Self {
        Self::new(1, 10)
    }
}
