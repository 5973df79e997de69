//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::time::duration::parse_duration;

/// Default tick period: 300 ms.
fn default_frequency_ms() -> u64 {
    300
}

/// Default worker thread stack size: 1MB.
fn default_thread_stack_size() -> usize {
    1024 * 1024
}

/// Default prefix for the loop and worker thread names.
fn default_thread_name_prefix() -> String {
    "chime".to_string()
}

/// Configuration for a [`Scheduler`](crate::Scheduler).
///
/// The tick `frequency` bounds scheduling resolution: a job can fire at most
/// once per tick, and periodic jobs whose period is below the tick period are
/// rejected at scheduling time.
///
/// # Example
///
/// ```rust
/// use chime::SchedulerConfig;
///
/// let config = SchedulerConfig::new()
///     .with_frequency_ms(100)
///     .with_thread_name_prefix("billing");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick period in milliseconds.
    ///
    /// Default: 300.
    #[serde(default = "default_frequency_ms")]
    pub frequency_ms: u64,

    /// Stack size per worker thread in bytes.
    ///
    /// Default: 1MB (1024 * 1024 bytes).
    #[serde(default = "default_thread_stack_size")]
    pub thread_stack_size: usize,

    /// Prefix for the loop thread name (`<prefix>-tick`) and worker thread
    /// names (`<prefix>-job-<id>`).
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frequency_ms: default_frequency_ms(),
            thread_stack_size: default_thread_stack_size(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl SchedulerConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick period in milliseconds.
    #[must_use]
    pub fn with_frequency_ms(mut self, frequency_ms: u64) -> Self {
        self.frequency_ms = frequency_ms;
        self
    }

    /// Set the tick period from a duration string such as `"5s"` or `"250ms"`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDuration` for unparseable input and `InvalidArgument`
    /// for non-positive periods.
    pub fn with_frequency_spec(mut self, spec: &str) -> Result<Self> {
        let secs = parse_duration(spec)?;
        if secs <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "tick frequency must be positive, got {spec:?}"
            )));
        }
        self.frequency_ms = (secs * 1000.0).round() as u64;
        Ok(self)
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size;
        self
    }

    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Get the tick period as a `Duration`.
    #[must_use]
    pub fn frequency(&self) -> Duration {
        Duration::from_millis(self.frequency_ms)
    }

    /// Get the tick period as fractional seconds.
    #[must_use]
    pub fn frequency_secs(&self) -> f64 {
        self.frequency_ms as f64 / 1000.0
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.frequency_ms == 0 {
            return Err(Error::InvalidArgument(
                "frequency_ms must be greater than 0".into(),
            ));
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err(Error::InvalidArgument(
                "thread_stack_size must be at least 64KB".into(),
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(Error::InvalidArgument(
                "thread_name_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string and validate it.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let cfg: SchedulerConfig = serde_json::from_str(input)
            .map_err(|e| Error::InvalidArgument(format!("config parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
