//! Session state management
//!
//! Defines the capture session states, configuration, and the snapshot the
//! frontend observes.

use crate::capture::traits::{FacingMode, Resolution};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No stream, nothing happening
    Idle,
    /// Waiting on device acquisition (permission prompt / hardware spin-up)
    Initializing,
    /// Stream acquired, ready to record
    Ready,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
    /// Recording finalized into an output blob
    Stopped,
    /// Unrecoverable failure; requires reset/re-acquire
    Errored,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Why a session transitioned to Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// User pressed stop
    Manual,
    /// The configured maximum duration was reached
    MaxDuration,
}

/// Configuration for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Hard auto-stop ceiling in seconds
    #[serde(default = "default_max_duration")]
    pub max_duration_seconds: u32,

    /// Floor below which the clip cannot be accepted
    #[serde(default = "default_min_duration")]
    pub min_duration_seconds: u32,

    /// Camera selection hint
    #[serde(default)]
    pub facing_mode: FacingMode,

    /// Whether to request microphone access
    #[serde(default = "default_include_audio")]
    pub include_audio: bool,

    /// Preferred capture resolution
    #[serde(default)]
    pub resolution: Option<Resolution>,

    /// Specific camera device ID (overrides `facing_mode` when set)
    #[serde(default)]
    pub camera_device_id: Option<String>,

    /// Specific microphone device ID (if capturing audio)
    #[serde(default)]
    pub microphone_device_id: Option<String>,

    /// How often the capture device is polled for data, in milliseconds
    #[serde(default = "default_chunk_interval")]
    pub chunk_interval_ms: u64,
}

fn default_max_duration() -> u32 {
    120
}

fn default_min_duration() -> u32 {
    10
}

fn default_include_audio() -> bool {
    true
}

fn default_chunk_interval() -> u64 {
    100
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_duration_seconds: default_max_duration(),
            min_duration_seconds: default_min_duration(),
            facing_mode: FacingMode::User,
            include_audio: true,
            resolution: None,
            camera_device_id: None,
            microphone_device_id: None,
            chunk_interval_ms: default_chunk_interval(),
        }
    }
}

/// Point-in-time view of a session for the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session ID
    pub id: Uuid,

    /// Current state
    pub state: SessionState,

    /// Seconds recorded so far
    pub elapsed_seconds: u32,

    /// Configured minimum duration
    pub min_duration_seconds: u32,

    /// Configured maximum duration
    pub max_duration_seconds: u32,

    /// Why the session stopped (Stopped only)
    pub stop_reason: Option<StopReason>,

    /// Failure description (Errored only)
    pub error: Option<String>,

    /// Size of the finalized blob in bytes (Stopped only)
    pub output_bytes: Option<usize>,

    /// When recording started
    pub started_at: Option<DateTime<Utc>>,

    /// When the session stopped
    pub stopped_at: Option<DateTime<Utc>>,
}

/// Result of accepting a completed clip
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipOutput {
    /// Session that produced the clip
    pub session_id: Uuid,

    /// Path the blob was written to for the host
    pub path: String,

    /// Clip duration in seconds
    pub duration_seconds: u32,

    /// Blob size in bytes
    pub size_bytes: usize,
}
