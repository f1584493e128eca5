//! Recording state management
//!
//! Defines the session state machine, the recording configuration and the
//! values handed back to callers.

use serde::{Deserialize, Serialize};

/// Current state of the recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// No recording in progress
    Idle,
    /// Waiting for the user to answer the capture consent dialog
    AwaitingPermission,
    /// Recorder armed and capturing (pause/resume stay here)
    Recording,
    /// Stop requested, waiting for the recorder to finish
    Stopping,
    /// Recorder finished, artifact being published
    Saving,
    /// Recorder reported an error; always falls back to idle
    Errored,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl SessionState {
    /// Whether a session currently occupies the controller
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }
}

/// Options passed by the caller to `setup`
///
/// Every field is optional; see [`Configuration`] for the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupOptions {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub mic: Option<bool>,
    pub fps: Option<u32>,
    pub bitrate: Option<u32>,
}

/// Validated recording configuration captured at `setup` time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Capture width in pixels (0 = engine default)
    pub width: u32,

    /// Capture height in pixels (0 = engine default)
    pub height: u32,

    /// Whether to record the microphone
    pub mic: bool,

    /// Custom frame rate
    pub fps: Option<u32>,

    /// Custom video bitrate
    pub bitrate: Option<u32>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            mic: true,
            fps: None,
            bitrate: None,
        }
    }
}

impl Configuration {
    /// Whether the engine needs its custom settings mode enabled
    pub fn custom_settings(&self) -> bool {
        self.fps.is_some() || self.bitrate.is_some()
    }
}

impl From<SetupOptions> for Configuration {
    fn from(options: SetupOptions) -> Self {
        Self {
            width: whole_pixels(options.width),
            height: whole_pixels(options.height),
            mic: options.mic.unwrap_or(true),
            fps: options.fps,
            bitrate: options.bitrate,
        }
    }
}

fn whole_pixels(value: Option<f64>) -> u32 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.ceil().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

/// Resolution of a `startRecording` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartOutcome {
    #[serde(rename = "started")]
    Started,
    /// The user denied or cancelled the consent dialog
    #[serde(rename = "permission_error")]
    PermissionDenied,
}

/// Locators of a published recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedRecording {
    #[serde(rename = "outputURL")]
    pub output_url: String,
    pub gallery_path: String,
}

/// Resolution of a `stopRecording` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResult {
    pub status: String,
    pub result: PublishedRecording,
}

impl StopResult {
    pub fn success(result: PublishedRecording) -> Self {
        Self {
            status: "success".to_string(),
            result,
        }
    }
}

/// Resolution of a `clean` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanOutcome {
    #[serde(rename = "cleaned")]
    Cleaned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_defaults() {
        let config = Configuration::from(SetupOptions::default());
        assert_eq!(config.width, 0);
        assert_eq!(config.height, 0);
        assert!(config.mic);
        assert!(!config.custom_settings());
    }

    #[test]
    fn test_configuration_from_json() {
        let options: SetupOptions =
            serde_json::from_str(r#"{"width": 1079.5, "height": 1920, "mic": false, "fps": 30}"#)
                .unwrap();
        let config = Configuration::from(options);

        assert_eq!(config.width, 1080);
        assert_eq!(config.height, 1920);
        assert!(!config.mic);
        assert_eq!(config.fps, Some(30));
        assert!(config.custom_settings());
    }

    #[test]
    fn test_negative_dimensions_fall_back_to_zero() {
        let config = Configuration::from(SetupOptions {
            width: Some(-10.0),
            height: Some(f64::NAN),
            ..Default::default()
        });
        assert_eq!(config.width, 0);
        assert_eq!(config.height, 0);
    }

    #[test]
    fn test_wire_shapes() {
        assert_eq!(serde_json::to_value(StartOutcome::Started).unwrap(), "started");
        assert_eq!(
            serde_json::to_value(StartOutcome::PermissionDenied).unwrap(),
            "permission_error"
        );
        assert_eq!(serde_json::to_value(CleanOutcome::Cleaned).unwrap(), "cleaned");

        let stop = StopResult::success(PublishedRecording {
            output_url: "file:///movies/a.mp4".into(),
            gallery_path: "file:///movies/a.mp4".into(),
        });
        let json = serde_json::to_value(&stop).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["result"]["outputURL"], "file:///movies/a.mp4");
        assert_eq!(json["result"]["galleryPath"], "file:///movies/a.mp4");
    }
}
