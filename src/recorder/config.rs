//! Controller configuration
//!
//! Loaded from JSON by the host; every field has a default.

use crate::utils::error::RecordResult;
use serde::{Deserialize, Serialize};

/// What to do with an artifact whose recording finished without a pending stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnclaimedPolicy {
    /// Leave it in the working directory
    Keep,
    /// Publish it to the gallery anyway
    Publish,
    /// Delete it
    Discard,
}

impl Default for UnclaimedPolicy {
    fn default() -> Self {
        Self::Keep
    }
}

/// Naming and placement of published gallery entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryConfig {
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    #[serde(default = "default_mime_type")]
    pub mime_type: String,

    /// Location under the shared media root (the platform movies folder)
    #[serde(default = "default_relative_path")]
    pub relative_path: String,
}

fn default_name_prefix() -> String {
    "ScreenRecord_".to_string()
}

fn default_mime_type() -> String {
    "video/mp4".to_string()
}

fn default_relative_path() -> String {
    "Movies".to_string()
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            mime_type: default_mime_type(),
            relative_path: default_relative_path(),
        }
    }
}

/// Configuration of the recording controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    /// Name of the working directory for temporary recordings
    #[serde(default = "default_working_dir_name")]
    pub working_dir_name: String,

    /// Encoder to use when the device has it
    #[serde(default = "default_preferred_encoder")]
    pub preferred_encoder: String,

    #[serde(default)]
    pub unclaimed_completion: UnclaimedPolicy,

    #[serde(default)]
    pub gallery: GalleryConfig,
}

fn default_working_dir_name() -> String {
    "ReactNativeRecordScreen".to_string()
}

fn default_preferred_encoder() -> String {
    "h264".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            working_dir_name: default_working_dir_name(),
            preferred_encoder: default_preferred_encoder(),
            unclaimed_completion: UnclaimedPolicy::default(),
            gallery: GalleryConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_json(json: &str) -> RecordResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::RecordError;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = ControllerConfig::from_json("{}").unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.working_dir_name, "ReactNativeRecordScreen");
        assert_eq!(config.gallery.mime_type, "video/mp4");
        assert_eq!(config.unclaimed_completion, UnclaimedPolicy::Keep);
    }

    #[test]
    fn test_partial_override() {
        let config = ControllerConfig::from_json(
            r#"{"unclaimedCompletion": "publish", "gallery": {"relativePath": "Movies/Captures"}}"#,
        )
        .unwrap();
        assert_eq!(config.unclaimed_completion, UnclaimedPolicy::Publish);
        assert_eq!(config.gallery.relative_path, "Movies/Captures");
        assert_eq!(config.gallery.name_prefix, "ScreenRecord_");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ControllerConfig::from_json(r#"{"unclaimedCompletion": "maybe"}"#),
            Err(RecordError::Config(_))
        ));
    }
}
