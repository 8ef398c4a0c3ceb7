//! Device enumeration commands

use crate::capture::devices::{get_cameras, get_microphones};
use crate::capture::traits::{CameraInfo, MicrophoneInfo};

/// Get list of available cameras/webcams
#[tauri::command]
pub async fn list_cameras() -> Result<Vec<CameraInfo>, String> {
    Ok(get_cameras())
}

/// Get list of available microphones
#[tauri::command]
pub async fn list_microphones() -> Result<Vec<MicrophoneInfo>, String> {
    Ok(get_microphones())
}
