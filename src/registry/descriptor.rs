//! Stream descriptors
//!
//! A descriptor is the identity and delivery policy of one configured
//! source. Descriptors are owned by the persistence layer; the registry only
//! keeps a copy.

use serde::{Deserialize, Serialize};

/// Identity and policy for one media source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Unique stream ID
    pub id: String,
    /// Source address (e.g. `rtsp://camera.local/stream1`)
    pub url: String,
    /// Ingestion starts on first viewer and stops when idle
    #[serde(default)]
    pub on_demand: bool,
    /// Ask the source client to skip audio tracks
    #[serde(default)]
    pub disable_audio: bool,
    /// Verbose source client logging
    #[serde(default)]
    pub debug: bool,
}

impl StreamDescriptor {
    /// Create an always-on descriptor
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            on_demand: false,
            disable_audio: false,
            debug: false,
        }
    }

    /// Create an on-demand descriptor with a freshly generated ID
    pub fn generated(url: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), url).on_demand(true)
    }

    /// Set the on-demand flag
    pub fn on_demand(mut self, on_demand: bool) -> Self {
        self.on_demand = on_demand;
        self
    }

    /// Set the disable-audio flag
    pub fn disable_audio(mut self, disable: bool) -> Self {
        self.disable_audio = disable;
        self
    }

    /// Set the debug flag
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_is_on_demand() {
        let a = StreamDescriptor::generated("rtsp://example/cam1");
        let b = StreamDescriptor::generated("rtsp://example/cam1");

        assert!(a.on_demand);
        assert_eq!(a.url, "rtsp://example/cam1");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"id":"cam-1","url":"rtsp://example/cam1"}"#;
        let desc: StreamDescriptor = serde_json::from_str(json).unwrap();

        assert_eq!(desc, StreamDescriptor::new("cam-1", "rtsp://example/cam1"));
        assert!(!desc.on_demand);
        assert!(!desc.disable_audio);
    }
}
