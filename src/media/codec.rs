//! Codec descriptors
//!
//! A codec descriptor describes one media track as discovered from the
//! source at connect time. The registry stores the ordered sequence of
//! descriptors for each stream and viewer sessions negotiate against it.

use bytes::Bytes;

/// Encoding of a single track
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// H.264 / AVC video
    H264,
    /// H.265 / HEVC video
    H265,
    /// MJPEG video
    Mjpeg,
    /// AAC audio
    Aac,
    /// G.711 A-law audio
    PcmAlaw,
    /// G.711 µ-law audio
    PcmMulaw,
    /// Opus audio
    Opus,
}

impl CodecKind {
    /// Whether this is a video codec
    pub fn is_video(&self) -> bool {
        matches!(self, CodecKind::H264 | CodecKind::H265 | CodecKind::Mjpeg)
    }

    /// Whether this is an audio codec
    pub fn is_audio(&self) -> bool {
        !self.is_video()
    }

    /// Whether a browser session can carry this codec without transcoding
    pub fn is_webrtc_supported(&self) -> bool {
        matches!(
            self,
            CodecKind::H264 | CodecKind::PcmAlaw | CodecKind::PcmMulaw | CodecKind::Opus
        )
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CodecKind::H264 => "H264",
            CodecKind::H265 => "H265",
            CodecKind::Mjpeg => "MJPEG",
            CodecKind::Aac => "AAC",
            CodecKind::PcmAlaw => "PCM_ALAW",
            CodecKind::PcmMulaw => "PCM_MULAW",
            CodecKind::Opus => "OPUS",
        };
        f.write_str(name)
    }
}

/// Kind of track exposed to a viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Video track
    Video,
    /// Audio track
    Audio,
}

impl TrackKind {
    /// Lowercase name, as used in session descriptions
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        }
    }
}

/// Descriptor for one media track
///
/// Cheap to clone: the decoder configuration is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    /// Track encoding
    pub kind: CodecKind,
    /// Decoder configuration record (SPS/PPS, AudioSpecificConfig, ...)
    pub extradata: Bytes,
}

impl Codec {
    /// Create a descriptor with no decoder configuration
    pub fn new(kind: CodecKind) -> Self {
        Self {
            kind,
            extradata: Bytes::new(),
        }
    }

    /// Create a descriptor carrying a decoder configuration record
    pub fn with_extradata(kind: CodecKind, extradata: Bytes) -> Self {
        Self { kind, extradata }
    }
}

/// Whether a codec sequence describes an audio-only stream
///
/// Audio-only streams have no keyframes, so every unit counts as one for
/// watchdog purposes.
pub fn is_audio_only(codecs: &[Codec]) -> bool {
    codecs.len() == 1 && codecs[0].kind.is_audio()
}

/// Map codecs to the tracks a browser session will carry
///
/// Codecs that cannot be delivered without transcoding are skipped.
pub fn webrtc_tracks(codecs: &[Codec]) -> Vec<TrackKind> {
    codecs
        .iter()
        .filter_map(|codec| {
            if !codec.kind.is_webrtc_supported() {
                tracing::debug!(codec = %codec.kind, "Codec not supported for WebRTC, skipping track");
                return None;
            }
            if codec.kind.is_video() {
                Some(TrackKind::Video)
            } else {
                Some(TrackKind::Audio)
            }
        })
        .collect()
}
