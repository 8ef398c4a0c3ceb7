//! Capture controller
//!
//! Orchestrates the device stream, the session state machine, and the two
//! periodic timers (1 s duration tick, chunk pull). Session and stream sit
//! behind one lock, so every transition is atomic with respect to tick and
//! chunk callbacks: a stop racing an in-flight chunk pull always observes
//! either the chunk fully appended or fully dropped, never a torn blob.

use super::clock::IntervalTimer;
use super::session::{CaptureSession, SessionError, TickOutcome};
use super::state::{SessionConfig, SessionSnapshot, SessionState, StopReason};
use crate::capture::traits::{CaptureDevice, DeviceStream, StreamConstraints};
use crate::utils::error::{AppError, AppResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Events emitted during capture, forwarded to the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CaptureEvent {
    /// Recording started
    Started,
    /// Recording paused
    Paused,
    /// Recording resumed
    Resumed,
    /// Recording stopped, manually or at the duration ceiling
    Stopped {
        reason: StopReason,
        elapsed_seconds: u32,
    },
    /// One second of recording elapsed
    Progress { elapsed_seconds: u32 },
    /// The session failed
    Errored { message: String },
    /// The user abandoned capture
    Cancelled,
}

struct Core {
    session: CaptureSession,
    stream: Option<Box<dyn DeviceStream>>,
    duration_timer: Option<IntervalTimer>,
    chunk_timer: Option<IntervalTimer>,
}

impl Core {
    fn cancel_timers(&mut self) {
        // Dropping aborts the backing tasks.
        self.duration_timer = None;
        self.chunk_timer = None;
    }

    /// Stop capture, cancel timers, and release the stream tracks. Each
    /// step runs unconditionally; release is never skipped.
    fn teardown_stream(&mut self) {
        self.cancel_timers();
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }

    fn stream_live(&self) -> bool {
        self.stream.as_ref().map(|s| s.is_live()).unwrap_or(false)
    }

    fn set_capturing(&mut self, active: bool) {
        if let Some(stream) = self.stream.as_mut() {
            stream.set_capturing(active);
        }
    }

    /// Pull whatever the device has buffered into the session before a
    /// transition finalizes or freezes the chunk sequence. Only meaningful
    /// while Recording; read errors are left for the regular chunk pull.
    fn drain_pending(&mut self) {
        if self.session.state() != SessionState::Recording {
            return;
        }
        if let Some(stream) = self.stream.as_mut() {
            if let Ok(chunk) = stream.read_chunk() {
                self.session.push_chunk(chunk);
            }
        }
    }
}

struct Inner {
    device: Arc<dyn CaptureDevice>,
    core: Mutex<Core>,
    event_tx: broadcast::Sender<CaptureEvent>,
}

/// Drives one capture session at a time against a capture device.
///
/// Cheap to clone; all clones share the same session.
#[derive(Clone)]
pub struct CaptureController {
    inner: Arc<Inner>,
}

impl CaptureController {
    /// Create a controller over the given capture backend
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(Inner {
                device,
                core: Mutex::new(Core {
                    session: CaptureSession::new(SessionConfig::default()),
                    stream: None,
                    duration_timer: None,
                    chunk_timer: None,
                }),
                event_tx,
            }),
        }
    }

    /// Subscribe to capture events
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.inner.event_tx.subscribe()
    }

    fn emit(&self, event: CaptureEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    /// Acquire the camera/microphone and move the session to Ready.
    ///
    /// The session shows Initializing while the backend works. Failures
    /// land in the Errored state with a classified message, never a
    /// propagated exception. Rejected while a session is Recording, Paused,
    /// or already Initializing: an active recording must be stopped or
    /// cancelled explicitly before the hardware changes hands.
    pub async fn acquire(&self, config: SessionConfig) -> AppResult<SessionSnapshot> {
        let constraints = {
            let mut core = self.inner.core.lock();
            match core.session.state() {
                SessionState::Recording | SessionState::Paused | SessionState::Initializing => {
                    return Err(SessionError::InvalidTransition {
                        from: core.session.state(),
                        action: "acquire",
                    }
                    .into());
                }
                _ => {}
            }
            // A fresh acquisition replaces whatever came before it.
            core.teardown_stream();
            core.session = CaptureSession::new(config.clone());
            core.session.begin_acquire()?;
            StreamConstraints {
                resolution: config.resolution,
                facing_mode: config.facing_mode,
                include_audio: config.include_audio,
                camera_device_id: config.camera_device_id.clone(),
                microphone_device_id: config.microphone_device_id.clone(),
            }
        };

        tracing::info!("Acquiring capture device (audio: {})", constraints.include_audio);
        let acquired = self.inner.device.acquire(&constraints).await;

        let mut core = self.inner.core.lock();
        match acquired {
            Ok(mut stream) => {
                if let Err(e) = core.session.stream_ready() {
                    // The session was cancelled or reset while acquisition
                    // was in flight; don't hold the hardware.
                    stream.release();
                    return Err(e.into());
                }
                core.stream = Some(stream);
                tracing::info!("Capture device ready");
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("Device acquisition failed: {}", message);
                core.session.acquire_failed(message.clone());
                self.emit(CaptureEvent::Errored { message });
            }
        }
        Ok(core.session.snapshot())
    }

    /// Start recording. Spawns the duration and chunk timers.
    pub fn start(&self) -> AppResult<()> {
        let mut core = self.inner.core.lock();
        if !core.stream_live() {
            return Err(AppError::Capture(
                "no live device stream; acquire first".to_string(),
            ));
        }
        core.session.start()?;
        core.set_capturing(true);

        let chunk_period = Duration::from_millis(core.session.config().chunk_interval_ms);
        let tick_controller = self.clone();
        core.duration_timer = Some(IntervalTimer::spawn(Duration::from_secs(1), move || {
            let controller = tick_controller.clone();
            async move { controller.handle_tick() }
        }));
        let chunk_controller = self.clone();
        core.chunk_timer = Some(IntervalTimer::spawn(chunk_period, move || {
            let controller = chunk_controller.clone();
            async move { controller.handle_chunk_pull() }
        }));

        tracing::info!("Recording started (session {})", core.session.id());
        self.emit(CaptureEvent::Started);
        Ok(())
    }

    /// Apply one duration tick under the lock
    fn handle_tick(&self) {
        let mut core = self.inner.core.lock();
        // A tick that reaches the ceiling finalizes the blob; deliver any
        // buffered capture first so the blob is complete.
        let will_auto_stop = core.session.state() == SessionState::Recording
            && core.session.elapsed_seconds() + 1 >= core.session.config().max_duration_seconds;
        if will_auto_stop {
            core.drain_pending();
        }
        match core.session.on_tick() {
            TickOutcome::Advanced(elapsed_seconds) => {
                self.emit(CaptureEvent::Progress { elapsed_seconds });
            }
            TickOutcome::AutoStopped(elapsed_seconds) => {
                core.cancel_timers();
                core.set_capturing(false);
                tracing::info!("Auto-stopped at {}s (max duration)", elapsed_seconds);
                self.emit(CaptureEvent::Stopped {
                    reason: StopReason::MaxDuration,
                    elapsed_seconds,
                });
            }
            TickOutcome::Ignored => {}
        }
    }

    /// Pull one chunk from the device under the lock
    fn handle_chunk_pull(&self) {
        let mut core = self.inner.core.lock();
        if core.session.state() != SessionState::Recording {
            return;
        }
        let Some(stream) = core.stream.as_mut() else {
            return;
        };
        match stream.read_chunk() {
            Ok(chunk) => core.session.push_chunk(chunk),
            Err(e) => {
                let message = e.to_string();
                core.session.fail(message.clone());
                core.teardown_stream();
                self.emit(CaptureEvent::Errored { message });
            }
        }
    }

    /// Pause recording. The timers stay up; ticks are ignored while Paused
    /// and device capture is switched off, so elapsed time and chunks are
    /// frozen.
    pub fn pause(&self) -> AppResult<()> {
        let mut core = self.inner.core.lock();
        core.drain_pending();
        core.session.pause()?;
        core.set_capturing(false);
        tracing::info!("Recording paused at {}s", core.session.elapsed_seconds());
        self.emit(CaptureEvent::Paused);
        Ok(())
    }

    /// Resume recording from the frozen elapsed value
    pub fn resume(&self) -> AppResult<()> {
        let mut core = self.inner.core.lock();
        core.session.resume()?;
        core.set_capturing(true);
        tracing::info!("Recording resumed at {}s", core.session.elapsed_seconds());
        self.emit(CaptureEvent::Resumed);
        Ok(())
    }

    /// Stop recording manually, finalizing the blob
    pub fn stop(&self) -> AppResult<SessionSnapshot> {
        let mut core = self.inner.core.lock();
        core.drain_pending();
        core.session.stop(StopReason::Manual)?;
        core.cancel_timers();
        core.set_capturing(false);
        let elapsed_seconds = core.session.elapsed_seconds();
        tracing::info!("Recording stopped at {}s", elapsed_seconds);
        self.emit(CaptureEvent::Stopped {
            reason: StopReason::Manual,
            elapsed_seconds,
        });
        Ok(core.session.snapshot())
    }

    /// Hand off the finalized blob, enforcing the minimum duration
    pub fn accept(&self) -> AppResult<(SessionSnapshot, Vec<u8>)> {
        let core = self.inner.core.lock();
        let blob = core.session.accept()?.to_vec();
        Ok((core.session.snapshot(), blob))
    }

    /// Discard the finished clip and return to Ready on the same stream
    pub fn discard_and_retry(&self) -> AppResult<SessionSnapshot> {
        let mut core = self.inner.core.lock();
        let live = core.stream_live();
        core.session.discard_and_retry(live)?;
        tracing::info!("Clip discarded; session back to ready");
        Ok(core.session.snapshot())
    }

    /// Abandon capture from any state.
    ///
    /// Cancels timers, releases the stream tracks, and resets the session.
    /// Idempotent: calling it again when nothing is active is a no-op.
    pub fn cancel(&self) {
        let mut core = self.inner.core.lock();
        let was_active =
            core.stream.is_some() || core.session.state() != SessionState::Idle;
        if !was_active {
            return;
        }
        core.teardown_stream();
        core.session.reset();
        tracing::info!("Capture cancelled");
        self.emit(CaptureEvent::Cancelled);
    }

    /// Current session snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.core.lock().session.snapshot()
    }
}
