//! Capture trait definitions
//!
//! Platform-agnostic traits and device descriptions for capture sources.
//! The `CaptureDevice`/`DeviceStream` seam is what the session controller
//! is written against; the native backend lives in `devices`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Supported resolutions
    pub supported_resolutions: Vec<Resolution>,
}

/// Information about a microphone
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicrophoneInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is the default input device
    pub is_default: bool,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Which camera the host prefers when more than one is present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front-facing camera (selfie)
    #[default]
    User,
    /// Rear-facing camera
    Environment,
}

/// Capability request passed to `CaptureDevice::acquire`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConstraints {
    /// Preferred resolution (backend picks its default when absent)
    #[serde(default)]
    pub resolution: Option<Resolution>,

    /// Camera selection hint
    #[serde(default)]
    pub facing_mode: FacingMode,

    /// Whether to request microphone access as well
    #[serde(default = "default_include_audio")]
    pub include_audio: bool,

    /// Specific camera device ID (overrides `facing_mode` when set)
    #[serde(default)]
    pub camera_device_id: Option<String>,

    /// Specific microphone device ID (if capturing audio)
    #[serde(default)]
    pub microphone_device_id: Option<String>,
}

fn default_include_audio() -> bool {
    true
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            resolution: None,
            facing_mode: FacingMode::User,
            include_audio: true,
            camera_device_id: None,
            microphone_device_id: None,
        }
    }
}

/// Why device acquisition failed
#[derive(Debug, Clone, Error)]
pub enum AcquireError {
    #[error("Camera/microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("No capture device found: {0}")]
    NoDevice(String),

    #[error("Capture device is busy: {0}")]
    DeviceBusy(String),

    #[error("Capture backend error: {0}")]
    Backend(String),
}

/// Error while pulling data from a live stream
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("Capture device disconnected: {0}")]
    Disconnected(String),

    #[error("Failed to read from capture device: {0}")]
    ReadFailed(String),
}

/// A live, exclusively-owned handle to the camera (and microphone).
///
/// The stream belongs to exactly one session. `release` must stop every
/// underlying track and is idempotent; dropping an unreleased stream
/// releases it too.
pub trait DeviceStream: Send {
    /// Pull the next encoded chunk from the device.
    ///
    /// Called on the capture interval while the session is Recording.
    fn read_chunk(&mut self) -> Result<Vec<u8>, StreamError>;

    /// Turn data capture on or off without releasing the hardware.
    ///
    /// Streams start with capture off. While capture is off the device
    /// keeps its tracks warm but buffers nothing, and anything buffered
    /// while capture was off is discarded when it turns back on — media
    /// from outside a recording span must never reach `read_chunk`.
    fn set_capturing(&mut self, active: bool);

    /// Whether the underlying tracks are still live
    fn is_live(&self) -> bool;

    /// Stop all underlying tracks, returning the hardware to the system
    fn release(&mut self);
}

/// A capture backend that can hand out device streams
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Request camera (and microphone) access.
    ///
    /// Suspends while the system initializes the hardware or prompts the
    /// user; failures come back as a classified `AcquireError`, never a
    /// panic.
    async fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn DeviceStream>, AcquireError>;
}
