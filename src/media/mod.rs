//! Media types shared by ingestion and delivery
//!
//! This module provides:
//! - Codec descriptors discovered from the source
//! - Media units carried from the source to viewer queues
//! - Track mapping for browser delivery

pub mod codec;
pub mod unit;

pub use codec::{is_audio_only, webrtc_tracks, Codec, CodecKind, TrackKind};
pub use unit::MediaUnit;
