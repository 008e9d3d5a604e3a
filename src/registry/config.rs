//! Registry configuration

use std::time::Duration;

/// Configuration for the stream registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each viewer's delivery queue
    ///
    /// When a queue is full, new units are dropped for that viewer only.
    pub viewer_queue_capacity: usize,

    /// Number of times the codec discovery gate polls before giving up
    pub codec_poll_attempts: u32,

    /// Delay between codec discovery polls
    pub codec_poll_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            viewer_queue_capacity: 100,
            codec_poll_attempts: 100,
            codec_poll_interval: Duration::from_millis(50),
        }
    }
}

impl RegistryConfig {
    /// Set the per-viewer queue capacity
    pub fn viewer_queue_capacity(mut self, capacity: usize) -> Self {
        // mpsc channels panic on zero capacity
        self.viewer_queue_capacity = capacity.max(1);
        self
    }

    /// Set the codec discovery polling budget
    pub fn codec_poll(mut self, attempts: u32, interval: Duration) -> Self {
        self.codec_poll_attempts = attempts;
        self.codec_poll_interval = interval;
        self
    }

    /// Upper bound on how long the codec discovery gate can wait
    pub fn codec_wait_budget(&self) -> Duration {
        self.codec_poll_interval * self.codec_poll_attempts
    }
}
