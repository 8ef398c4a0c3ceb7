//! Capture session commands
//!
//! The host UI drives the whole workflow through these: acquire, record,
//! pause/resume, stop, then accept or discard. Errors cross the boundary
//! as strings; device failures additionally land in the session snapshot
//! so the frontend always has something to render.

use crate::capture::devices::NativeCaptureDevice;
use crate::session::state::{ClipOutput, SessionConfig, SessionSnapshot};
use crate::session::CaptureController;
use std::io::Write;
use std::sync::Arc;
use tauri::State;

/// Application state for capture
pub struct CaptureState {
    pub controller: CaptureController,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self {
            controller: CaptureController::new(Arc::new(NativeCaptureDevice::new())),
        }
    }
}

/// Request camera/microphone access and get a ready-to-record session
#[tauri::command]
pub async fn acquire_stream(
    state: State<'_, CaptureState>,
    config: Option<SessionConfig>,
) -> Result<SessionSnapshot, String> {
    state
        .controller
        .acquire(config.unwrap_or_default())
        .await
        .map_err(|e| e.to_string())
}

/// Start recording
#[tauri::command]
pub async fn start_recording(state: State<'_, CaptureState>) -> Result<(), String> {
    state.controller.start().map_err(|e| e.to_string())
}

/// Pause recording
#[tauri::command]
pub async fn pause_recording(state: State<'_, CaptureState>) -> Result<(), String> {
    state.controller.pause().map_err(|e| e.to_string())
}

/// Resume recording
#[tauri::command]
pub async fn resume_recording(state: State<'_, CaptureState>) -> Result<(), String> {
    state.controller.resume().map_err(|e| e.to_string())
}

/// Stop recording and finalize the clip
#[tauri::command]
pub async fn stop_recording(
    state: State<'_, CaptureState>,
) -> Result<SessionSnapshot, String> {
    state.controller.stop().map_err(|e| e.to_string())
}

/// Accept the finished clip.
///
/// Enforces the minimum duration, writes the blob to a temp file, and hands
/// the path to the host. Anything beyond that (upload, persistence) is the
/// host's business.
#[tauri::command]
pub async fn accept_clip(state: State<'_, CaptureState>) -> Result<ClipOutput, String> {
    let (snapshot, blob) = state.controller.accept().map_err(|e| e.to_string())?;

    let (mut file, path) = tempfile::Builder::new()
        .prefix("clipbooth-")
        .suffix(".bin")
        .tempfile()
        .map_err(|e| format!("Failed to create clip file: {}", e))?
        .keep()
        .map_err(|e| format!("Failed to keep clip file: {}", e))?;
    file.write_all(&blob)
        .map_err(|e| format!("Failed to write clip file: {}", e))?;

    tracing::info!(
        "Clip accepted: {}s, {} bytes -> {}",
        snapshot.elapsed_seconds,
        blob.len(),
        path.display()
    );

    Ok(ClipOutput {
        session_id: snapshot.id,
        path: path.to_string_lossy().to_string(),
        duration_seconds: snapshot.elapsed_seconds,
        size_bytes: blob.len(),
    })
}

/// Discard the finished clip and get ready to record again on the same
/// stream
#[tauri::command]
pub async fn discard_and_retry(
    state: State<'_, CaptureState>,
) -> Result<SessionSnapshot, String> {
    state.controller.discard_and_retry().map_err(|e| e.to_string())
}

/// Abandon capture, releasing the camera and microphone
#[tauri::command]
pub async fn cancel_capture(state: State<'_, CaptureState>) -> Result<(), String> {
    state.controller.cancel();
    Ok(())
}

/// Get the current session snapshot
#[tauri::command]
pub async fn get_capture_state(
    state: State<'_, CaptureState>,
) -> Result<SessionSnapshot, String> {
    Ok(state.controller.snapshot())
}
