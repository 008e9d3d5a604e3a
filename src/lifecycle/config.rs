//! Lifecycle timing policy

use std::time::Duration;

/// Timing policy for ingestion workers and viewer sessions
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Bound on dialing a source
    pub dial_timeout: Duration,

    /// Bound on each source read/write
    pub read_write_timeout: Duration,

    /// How often an on-demand worker checks for viewers
    ///
    /// If the check finds no viewer, the worker exits with `NoViewer`.
    pub viewer_check_interval: Duration,

    /// Exit with `NoVideo` if no keyframe arrives within this window
    pub no_video_timeout: Duration,

    /// Delay before an always-on worker is restarted
    pub restart_backoff: Duration,

    /// A viewer session closes itself after this long without a keyframe
    pub viewer_idle_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(3),
            read_write_timeout: Duration::from_secs(3),
            viewer_check_interval: Duration::from_secs(20),
            no_video_timeout: Duration::from_secs(20),
            restart_backoff: Duration::from_secs(1),
            viewer_idle_timeout: Duration::from_secs(10),
        }
    }
}

impl LifecycleConfig {
    /// Set dial and read/write timeouts
    pub fn source_timeouts(mut self, dial: Duration, read_write: Duration) -> Self {
        self.dial_timeout = dial;
        self.read_write_timeout = read_write;
        self
    }

    /// Set the on-demand viewer check interval
    pub fn viewer_check_interval(mut self, interval: Duration) -> Self {
        self.viewer_check_interval = interval;
        self
    }

    /// Set the no-keyframe watchdog window
    pub fn no_video_timeout(mut self, timeout: Duration) -> Self {
        self.no_video_timeout = timeout;
        self
    }

    /// Set the always-on restart delay
    pub fn restart_backoff(mut self, backoff: Duration) -> Self {
        self.restart_backoff = backoff;
        self
    }

    /// Set the viewer session idle timeout
    pub fn viewer_idle_timeout(mut self, timeout: Duration) -> Self {
        self.viewer_idle_timeout = timeout;
        self
    }

    /// Upper bound on a whole dial, handshake included
    pub fn dial_budget(&self) -> Duration {
        self.dial_timeout + self.read_write_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LifecycleConfig::default();

        assert_eq!(config.dial_timeout, Duration::from_secs(3));
        assert_eq!(config.read_write_timeout, Duration::from_secs(3));
        assert_eq!(config.viewer_check_interval, Duration::from_secs(20));
        assert_eq!(config.no_video_timeout, Duration::from_secs(20));
        assert_eq!(config.restart_backoff, Duration::from_secs(1));
        assert_eq!(config.viewer_idle_timeout, Duration::from_secs(10));
        assert_eq!(config.dial_budget(), Duration::from_secs(6));
    }

    #[test]
    fn test_builder_chaining() {
        let config = LifecycleConfig::default()
            .source_timeouts(Duration::from_millis(500), Duration::from_secs(1))
            .viewer_check_interval(Duration::from_secs(5))
            .no_video_timeout(Duration::from_secs(7))
            .restart_backoff(Duration::from_millis(250))
            .viewer_idle_timeout(Duration::from_secs(2));

        assert_eq!(config.dial_timeout, Duration::from_millis(500));
        assert_eq!(config.read_write_timeout, Duration::from_secs(1));
        assert_eq!(config.viewer_check_interval, Duration::from_secs(5));
        assert_eq!(config.no_video_timeout, Duration::from_secs(7));
        assert_eq!(config.restart_backoff, Duration::from_millis(250));
        assert_eq!(config.viewer_idle_timeout, Duration::from_secs(2));
    }
}
