//! Codec discovery gate
//!
//! A viewer may ask for an on-demand stream whose worker has not finished the
//! source handshake yet. The gate turns that asynchronous discovery into a
//! bounded wait by polling the registry at a fixed interval.

use std::time::Duration;

use crate::media::Codec;

use super::error::RegistryError;
use super::store::StreamRegistry;

/// Outcome of waiting for a stream's codecs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecDiscovery {
    /// Codecs are available
    Ready(Vec<Codec>),
    /// The stream is not registered
    NotFound,
    /// The stream exists but produced no codecs within the polling budget
    TimedOut,
}

impl CodecDiscovery {
    /// Convert to a result for callers that only care about success
    pub fn into_result(self, id: &str) -> Result<Vec<Codec>, RegistryError> {
        match self {
            CodecDiscovery::Ready(codecs) => Ok(codecs),
            CodecDiscovery::NotFound => Err(RegistryError::StreamNotFound(id.to_string())),
            CodecDiscovery::TimedOut => Err(RegistryError::CodecTimeout(id.to_string())),
        }
    }
}

impl StreamRegistry {
    /// Wait for codecs using the configured polling budget
    pub async fn wait_for_codecs(&self, id: &str) -> CodecDiscovery {
        let attempts = self.config().codec_poll_attempts;
        let interval = self.config().codec_poll_interval;
        self.wait_for_codecs_with(id, attempts, interval).await
    }

    /// Wait for codecs, polling `attempts` times every `interval`
    ///
    /// Returns as soon as codecs appear, or immediately if the stream is
    /// absent (including when it is removed mid-wait).
    pub async fn wait_for_codecs_with(
        &self,
        id: &str,
        attempts: u32,
        interval: Duration,
    ) -> CodecDiscovery {
        for attempt in 0..attempts {
            if !self.exists(id).await {
                return CodecDiscovery::NotFound;
            }
            if let Some(codecs) = self.get_codecs(id).await {
                tracing::debug!(stream = %id, attempt = attempt, "Codecs discovered");
                return CodecDiscovery::Ready(codecs);
            }
            tokio::time::sleep(interval).await;
        }

        tracing::debug!(stream = %id, attempts = attempts, "Codec discovery timed out");
        CodecDiscovery::TimedOut
    }

    /// Wait for codecs, surfacing `StreamNotFound` or `CodecTimeout`
    pub async fn get_codecs_blocking(&self, id: &str) -> Result<Vec<Codec>, RegistryError> {
        self.wait_for_codecs(id).await.into_result(id)
    }
}
