//! Native capture backend
//!
//! Camera capture via nokhwa and microphone capture via cpal. Both devices
//! run on dedicated threads (the cpal stream is not `Send`, and nokhwa
//! cameras behave best when opened and polled from a single thread); the
//! threads feed a shared pending buffer that `read_chunk` drains.

use crate::capture::traits::{
    AcquireError, CameraInfo, CaptureDevice, DeviceStream, MicrophoneInfo, Resolution,
    StreamConstraints, StreamError,
};
use anyhow::Context;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

/// Get list of available cameras
pub fn get_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                let name = info.human_name().to_string();

                // Common resolutions
                let resolutions = vec![
                    Resolution { width: 1920, height: 1080 },
                    Resolution { width: 1280, height: 720 },
                    Resolution { width: 640, height: 480 },
                ];

                CameraInfo {
                    id,
                    name,
                    supported_resolutions: resolutions,
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Get list of available microphones
pub fn get_microphones() -> Vec<MicrophoneInfo> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|device| {
                let name = device.name().ok()?;
                Some(MicrophoneInfo {
                    id: name.clone(),
                    is_default: Some(&name) == default_name.as_ref(),
                    name,
                })
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate microphones: {:?}", e);
            Vec::new()
        }
    }
}

/// Classify a backend failure into the acquisition taxonomy
fn classify_acquire_error(err: anyhow::Error) -> AcquireError {
    let message = format!("{:#}", err);
    let lowered = message.to_lowercase();
    if lowered.contains("denied") || lowered.contains("permission") || lowered.contains("not authorized") {
        AcquireError::PermissionDenied(message)
    } else if lowered.contains("not found") || lowered.contains("no device") || lowered.contains("no camera") {
        AcquireError::NoDevice(message)
    } else if lowered.contains("busy") || lowered.contains("in use") {
        AcquireError::DeviceBusy(message)
    } else {
        AcquireError::Backend(message)
    }
}

/// Shared buffer the device threads append into
type PendingBuffer = Arc<ParkingMutex<Vec<u8>>>;

/// Stream handle backed by the native camera/microphone threads
struct NativeDeviceStream {
    pending: PendingBuffer,
    running: Arc<AtomicBool>,
    capturing: Arc<AtomicBool>,
    disconnected: Arc<AtomicBool>,
    released: bool,
    camera_thread: Option<JoinHandle<()>>,
    audio_thread: Option<JoinHandle<()>>,
}

impl DeviceStream for NativeDeviceStream {
    fn read_chunk(&mut self) -> Result<Vec<u8>, StreamError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(StreamError::Disconnected(
                "capture device stopped delivering data".to_string(),
            ));
        }
        if self.released {
            return Err(StreamError::ReadFailed("stream already released".to_string()));
        }
        let mut pending = self.pending.lock();
        Ok(std::mem::take(&mut *pending))
    }

    fn set_capturing(&mut self, active: bool) {
        let was = self.capturing.swap(active, Ordering::SeqCst);
        if active && !was {
            // Anything buffered while capture was off is not clip media.
            self.pending.lock().clear();
        }
    }

    fn is_live(&self) -> bool {
        !self.released && !self.disconnected.load(Ordering::SeqCst)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.camera_thread.take() {
            if handle.join().is_err() {
                tracing::warn!("Camera thread panicked during release");
            }
        }
        if let Some(handle) = self.audio_thread.take() {
            if handle.join().is_err() {
                tracing::warn!("Audio thread panicked during release");
            }
        }
        tracing::info!("Device stream released");
    }
}

impl Drop for NativeDeviceStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Get camera index from an optional device ID, falling back to the first
/// camera. Facing mode is a hint only; desktop backends rarely report it,
/// so an explicit device ID wins when present.
fn camera_index(device_id: &Option<String>) -> CameraIndex {
    match device_id {
        Some(id) => {
            if let Ok(idx) = id.parse::<u32>() {
                CameraIndex::Index(idx)
            } else {
                CameraIndex::String(id.clone())
            }
        }
        None => CameraIndex::Index(0),
    }
}

/// Spawn the camera thread. The camera is opened inside the thread and the
/// open result is reported back before the capture loop begins.
fn spawn_camera_thread(
    index: CameraIndex,
    pending: PendingBuffer,
    running: Arc<AtomicBool>,
    capturing: Arc<AtomicBool>,
    disconnected: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, AcquireError> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

    let handle = std::thread::spawn(move || {
        let format =
            RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = match Camera::new(index.clone(), format) {
            Ok(c) => c,
            Err(e) => {
                let _ = ready_tx.send(Err(format!("failed to open camera {:?}: {}", index, e)));
                return;
            }
        };

        if let Err(e) = camera.open_stream() {
            let _ = ready_tx.send(Err(format!("failed to open camera stream: {}", e)));
            return;
        }

        let camera_format = camera.camera_format();
        tracing::info!(
            "Camera opened: {}x{} @ {}fps",
            camera_format.resolution().width(),
            camera_format.resolution().height(),
            camera_format.frame_rate()
        );
        let _ = ready_tx.send(Ok(()));

        // Frames are pulled continuously to keep the camera warm, but only
        // buffered while capture is on.
        while running.load(Ordering::SeqCst) {
            match camera.frame() {
                Ok(frame) => {
                    if capturing.load(Ordering::SeqCst) {
                        let mut pending = pending.lock();
                        pending.extend_from_slice(frame.buffer());
                    }
                }
                Err(e) => {
                    tracing::error!("Camera frame read failed: {:?}", e);
                    disconnected.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }

        if let Err(e) = camera.stop_stream() {
            tracing::warn!("Failed to stop camera stream: {:?}", e);
        }
    });

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(message)) => {
            let _ = handle.join();
            Err(classify_acquire_error(anyhow::anyhow!(message)))
        }
        Err(_) => {
            let _ = handle.join();
            Err(AcquireError::Backend(
                "camera thread exited before reporting readiness".to_string(),
            ))
        }
    }
}

/// Spawn the microphone thread. The cpal stream is not `Send`, so it is
/// built and kept alive on this thread; samples land in the shared buffer.
fn spawn_audio_thread(
    device_id: Option<String>,
    pending: PendingBuffer,
    running: Arc<AtomicBool>,
    capturing: Arc<AtomicBool>,
    disconnected: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, AcquireError> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

    let handle = std::thread::spawn(move || {
        let build = || -> anyhow::Result<cpal::Stream> {
            let host = cpal::default_host();
            let device = match &device_id {
                Some(id) => host
                    .input_devices()
                    .context("failed to enumerate input devices")?
                    .find(|d| d.name().map(|n| &n == id).unwrap_or(false))
                    .with_context(|| format!("microphone not found: {}", id))?,
                None => host
                    .default_input_device()
                    .context("no device: no default microphone")?,
            };

            let config = device
                .default_input_config()
                .context("failed to query microphone config")?;
            let sample_format = config.sample_format();
            let stream_config: cpal::StreamConfig = config.into();

            let sample_pending = pending.clone();
            let sample_capturing = capturing.clone();
            let error_flag = disconnected.clone();
            let on_error = move |err| {
                tracing::error!("Microphone stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            };

            // Samples land in the shared buffer as f32 little-endian.
            let stream = match sample_format {
                cpal::SampleFormat::F32 => device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        if !sample_capturing.load(Ordering::SeqCst) {
                            return;
                        }
                        let mut pending = sample_pending.lock();
                        for sample in data {
                            pending.extend_from_slice(&sample.to_le_bytes());
                        }
                    },
                    on_error,
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        if !sample_capturing.load(Ordering::SeqCst) {
                            return;
                        }
                        let mut pending = sample_pending.lock();
                        for sample in data {
                            let normalized = *sample as f32 / i16::MAX as f32;
                            pending.extend_from_slice(&normalized.to_le_bytes());
                        }
                    },
                    on_error,
                    None,
                ),
                cpal::SampleFormat::U16 => device.build_input_stream(
                    &stream_config,
                    move |data: &[u16], _| {
                        if !sample_capturing.load(Ordering::SeqCst) {
                            return;
                        }
                        let mut pending = sample_pending.lock();
                        for sample in data {
                            let normalized = (*sample as f32 / u16::MAX as f32) * 2.0 - 1.0;
                            pending.extend_from_slice(&normalized.to_le_bytes());
                        }
                    },
                    on_error,
                    None,
                ),
                other => anyhow::bail!("unsupported microphone sample format: {:?}", other),
            }
            .context("failed to build microphone stream")?;
            stream.play().context("failed to start microphone stream")?;
            Ok(stream)
        };

        let stream = match build() {
            Ok(s) => s,
            Err(e) => {
                let _ = ready_tx.send(Err(format!("{:#}", e)));
                return;
            }
        };
        let _ = ready_tx.send(Ok(()));

        // Keep the stream alive until release flips the flag.
        while running.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        drop(stream);
    });

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(message)) => {
            let _ = handle.join();
            Err(classify_acquire_error(anyhow::anyhow!(message)))
        }
        Err(_) => {
            let _ = handle.join();
            Err(AcquireError::Backend(
                "audio thread exited before reporting readiness".to_string(),
            ))
        }
    }
}

/// The real camera/microphone backend
pub struct NativeCaptureDevice;

impl NativeCaptureDevice {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for NativeCaptureDevice {
    async fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn DeviceStream>, AcquireError> {
        let pending: PendingBuffer = Arc::new(ParkingMutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));
        // Capture is off until the session starts recording.
        let capturing = Arc::new(AtomicBool::new(false));
        let disconnected = Arc::new(AtomicBool::new(false));

        let index = camera_index(&constraints.camera_device_id);
        let mic_id = constraints.microphone_device_id.clone();
        let include_audio = constraints.include_audio;

        let camera_pending = pending.clone();
        let camera_running = running.clone();
        let camera_capturing = capturing.clone();
        let camera_disconnected = disconnected.clone();
        let audio_pending = pending.clone();
        let audio_running = running.clone();
        let audio_capturing = capturing.clone();
        let audio_disconnected = disconnected.clone();

        // Hardware initialization blocks; keep it off the async runtime.
        let result = tokio::task::spawn_blocking(move || {
            let camera_thread = spawn_camera_thread(
                index,
                camera_pending,
                camera_running.clone(),
                camera_capturing,
                camera_disconnected,
            )?;

            let audio_thread = if include_audio {
                match spawn_audio_thread(
                    mic_id,
                    audio_pending,
                    audio_running.clone(),
                    audio_capturing,
                    audio_disconnected,
                ) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        // Don't leave the camera running if the mic failed.
                        camera_running.store(false, Ordering::SeqCst);
                        let _ = camera_thread.join();
                        return Err(e);
                    }
                }
            } else {
                None
            };

            Ok((camera_thread, audio_thread))
        })
        .await
        .map_err(|e| AcquireError::Backend(format!("acquisition task failed: {}", e)))?;

        let (camera_thread, audio_thread) = result?;

        Ok(Box::new(NativeDeviceStream {
            pending,
            running,
            capturing,
            disconnected,
            released: false,
            camera_thread: Some(camera_thread),
            audio_thread,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_stream() -> NativeDeviceStream {
        NativeDeviceStream {
            pending: Arc::new(ParkingMutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(true)),
            capturing: Arc::new(AtomicBool::new(false)),
            disconnected: Arc::new(AtomicBool::new(false)),
            released: false,
            camera_thread: None,
            audio_thread: None,
        }
    }

    #[test]
    fn activating_capture_discards_buffered_residue() {
        let mut stream = bare_stream();

        // Media accumulated while capture was off must never be readable.
        stream.pending.lock().extend_from_slice(b"PRESTART");
        stream.set_capturing(true);
        assert_eq!(stream.read_chunk().unwrap(), Vec::<u8>::new());

        stream.pending.lock().extend_from_slice(b"LIVE");
        assert_eq!(stream.read_chunk().unwrap(), b"LIVE");

        // Same thing across an off/on cycle (a paused span).
        stream.set_capturing(false);
        stream.pending.lock().extend_from_slice(b"PAUSEDSPAN");
        stream.set_capturing(true);
        assert_eq!(stream.read_chunk().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn reasserting_capture_keeps_undrained_media() {
        let mut stream = bare_stream();
        stream.set_capturing(true);
        stream.pending.lock().extend_from_slice(b"LIVE");

        // Already-on transitions must not drop captured data.
        stream.set_capturing(true);
        assert_eq!(stream.read_chunk().unwrap(), b"LIVE");
    }

    #[test]
    fn release_is_idempotent_and_kills_reads() {
        let mut stream = bare_stream();
        stream.release();
        assert!(!stream.is_live());
        assert!(stream.read_chunk().is_err());
        stream.release();
        assert!(!stream.is_live());
    }

    #[test]
    fn classifies_acquire_errors() {
        assert!(matches!(
            classify_acquire_error(anyhow::anyhow!("Permission denied by user")),
            AcquireError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_acquire_error(anyhow::anyhow!("device not found")),
            AcquireError::NoDevice(_)
        ));
        assert!(matches!(
            classify_acquire_error(anyhow::anyhow!("resource busy")),
            AcquireError::DeviceBusy(_)
        ));
        assert!(matches!(
            classify_acquire_error(anyhow::anyhow!("unknown ioctl failure")),
            AcquireError::Backend(_)
        ));
    }
}
