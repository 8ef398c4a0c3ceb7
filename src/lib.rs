//! Clipbooth - guided camera clip capture, made simple.
//!
//! This is the main library crate for the Clipbooth application backend.
//! It owns the camera/microphone hardware, the capture session state
//! machine, and all recording timers; the webview frontend drives it
//! through commands and listens for `capture://event`.

pub mod capture;
pub mod commands;
pub mod session;
pub mod utils;

use commands::session::CaptureState;
use tauri::{Emitter, Manager};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the application
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clipbooth=debug,tauri=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Clipbooth v{}", env!("CARGO_PKG_VERSION"));

    tauri::Builder::default()
        .manage(CaptureState::default())
        .invoke_handler(tauri::generate_handler![
            // Device commands
            commands::capture::list_cameras,
            commands::capture::list_microphones,
            // Session commands
            commands::session::acquire_stream,
            commands::session::start_recording,
            commands::session::pause_recording,
            commands::session::resume_recording,
            commands::session::stop_recording,
            commands::session::accept_clip,
            commands::session::discard_and_retry,
            commands::session::cancel_capture,
            commands::session::get_capture_state,
        ])
        .setup(|app| {
            // Forward capture events to the webview
            let state = app.state::<CaptureState>();
            let mut events = state.controller.subscribe();
            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                while let Ok(event) = events.recv().await {
                    if let Err(e) = handle.emit("capture://event", &event) {
                        tracing::warn!("Failed to forward capture event: {}", e);
                    }
                }
            });
            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
