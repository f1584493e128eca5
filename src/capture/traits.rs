//! Capture trait definitions
//!
//! Platform-agnostic encoder capability probing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Information about a codec installed on the device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecInfo {
    /// Codec name as reported by the platform (e.g. `OMX.qcom.video.encoder.avc`)
    pub name: String,

    /// Whether this codec encodes (as opposed to decodes)
    pub is_encoder: bool,
}

impl CodecInfo {
    pub fn encoder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_encoder: true,
        }
    }

    pub fn decoder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_encoder: false,
        }
    }
}

/// Answers whether a named encoder is available on the device
pub trait CapabilityProbe: Send + Sync {
    fn supports_encoder(&self, encoder: &str) -> bool;
}

/// Probe over a snapshot of the device codec list
#[derive(Debug, Clone, Default)]
pub struct CodecList {
    codecs: Vec<CodecInfo>,
}

impl CodecList {
    pub fn new(codecs: Vec<CodecInfo>) -> Self {
        Self { codecs }
    }
}

impl CapabilityProbe for CodecList {
    fn supports_encoder(&self, encoder: &str) -> bool {
        let needle = encoder.to_lowercase();
        self.codecs
            .iter()
            .any(|codec| codec.is_encoder && codec.name.to_lowercase().contains(&needle))
    }
}

/// Video encoder handed to the recorder before it is armed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoEncoder {
    /// A specific encoder, named the way the engine expects (e.g. `H264`)
    Named(String),
    /// Whatever the engine picks by default
    Default,
}

impl fmt::Display for VideoEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoEncoder::Named(name) => f.write_str(name),
            VideoEncoder::Default => f.write_str("DEFAULT"),
        }
    }
}

/// Pick the preferred encoder when the device has it, the default otherwise
pub fn select_encoder(probe: &dyn CapabilityProbe, preferred: &str) -> VideoEncoder {
    if probe.supports_encoder(preferred) {
        VideoEncoder::Named(preferred.to_uppercase())
    } else {
        tracing::info!("Encoder '{}' not available, using default encoder", preferred);
        VideoEncoder::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_matches_case_insensitive_encoders_only() {
        let probe = CodecList::new(vec![
            CodecInfo::decoder("c2.android.hevc.decoder"),
            CodecInfo::encoder("OMX.qcom.video.encoder.H264"),
        ]);

        assert!(probe.supports_encoder("h264"));
        assert!(!probe.supports_encoder("hevc"));
    }

    #[test]
    fn test_select_encoder() {
        let with_h264 = CodecList::new(vec![CodecInfo::encoder("c2.exynos.h264.encoder")]);
        assert_eq!(
            select_encoder(&with_h264, "h264"),
            VideoEncoder::Named("H264".to_string())
        );

        let without = CodecList::default();
        assert_eq!(select_encoder(&without, "h264"), VideoEncoder::Default);
        assert_eq!(VideoEncoder::Default.to_string(), "DEFAULT");
    }
}
