//! Capture session state machine
//!
//! One `CaptureSession` is one attempt at capturing a clip. All transitions
//! go through methods returning `Result`, so contradictory flag combinations
//! (recording while holding a finalized blob, for instance) cannot be
//! represented.

use super::state::{SessionConfig, SessionSnapshot, SessionState, StopReason};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Errors produced by invalid session operations
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Cannot {action} from {from:?} state")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },

    #[error("Clip too short: {elapsed}s recorded, {required}s required ({remaining}s more needed)")]
    ClipTooShort {
        elapsed: u32,
        required: u32,
        remaining: u32,
    },

    #[error("Device stream is no longer live; re-acquisition required")]
    StreamGone,
}

/// What a duration tick did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Elapsed time advanced to the contained value
    Advanced(u32),
    /// Elapsed time reached the maximum and the session auto-stopped
    AutoStopped(u32),
    /// The session was not Recording; nothing changed
    Ignored,
}

/// One clip-capture attempt
#[derive(Debug)]
pub struct CaptureSession {
    id: Uuid,
    config: SessionConfig,
    state: SessionState,
    elapsed_seconds: u32,
    chunks: Vec<Vec<u8>>,
    output: Option<Vec<u8>>,
    stop_reason: Option<StopReason>,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
}

impl CaptureSession {
    /// Create a new idle session
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            state: SessionState::Idle,
            elapsed_seconds: 0,
            chunks: Vec::new(),
            output: None,
            stop_reason: None,
            error: None,
            started_at: None,
            stopped_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Enter Initializing while device acquisition is in flight.
    ///
    /// Valid from Idle, Ready (re-acquire), Stopped, and Errored; the paths
    /// out of a failed or finished session both run through here. Clears any
    /// previous output and error.
    pub fn begin_acquire(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle
            | SessionState::Ready
            | SessionState::Stopped
            | SessionState::Errored => {
                self.state = SessionState::Initializing;
                self.elapsed_seconds = 0;
                self.chunks.clear();
                self.output = None;
                self.stop_reason = None;
                self.error = None;
                Ok(())
            }
            from => Err(SessionError::InvalidTransition {
                from,
                action: "acquire",
            }),
        }
    }

    /// The device stream came up; the session can record.
    pub fn stream_ready(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Initializing => {
                self.state = SessionState::Ready;
                Ok(())
            }
            from => Err(SessionError::InvalidTransition {
                from,
                action: "mark ready",
            }),
        }
    }

    /// Device acquisition failed; the message is what the frontend renders.
    pub fn acquire_failed(&mut self, message: impl Into<String>) {
        self.state = SessionState::Errored;
        self.error = Some(message.into());
        self.chunks.clear();
        self.output = None;
    }

    /// Begin recording. Resets elapsed time and clears chunks.
    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Ready => {
                self.state = SessionState::Recording;
                self.elapsed_seconds = 0;
                self.chunks.clear();
                self.output = None;
                self.stop_reason = None;
                self.started_at = Some(Utc::now());
                self.stopped_at = None;
                Ok(())
            }
            from => Err(SessionError::InvalidTransition {
                from,
                action: "start",
            }),
        }
    }

    /// Freeze the timer and data capture without finalizing.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Recording => {
                self.state = SessionState::Paused;
                Ok(())
            }
            from => Err(SessionError::InvalidTransition {
                from,
                action: "pause",
            }),
        }
    }

    /// Resume from the frozen elapsed value, appending to the same chunks.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Paused => {
                self.state = SessionState::Recording;
                Ok(())
            }
            from => Err(SessionError::InvalidTransition {
                from,
                action: "resume",
            }),
        }
    }

    /// Finalize the chunks into the output blob.
    pub fn stop(&mut self, reason: StopReason) -> Result<(), SessionError> {
        match self.state {
            SessionState::Recording | SessionState::Paused => {
                let blob: Vec<u8> = self.chunks.drain(..).flatten().collect();
                self.output = Some(blob);
                self.state = SessionState::Stopped;
                self.stop_reason = Some(reason);
                self.stopped_at = Some(Utc::now());
                Ok(())
            }
            from => Err(SessionError::InvalidTransition {
                from,
                action: "stop",
            }),
        }
    }

    /// Apply one duration tick (1 second).
    ///
    /// Elapsed time advances only while Recording; hitting the maximum
    /// duration stops the session within the same tick.
    pub fn on_tick(&mut self) -> TickOutcome {
        if self.state != SessionState::Recording {
            return TickOutcome::Ignored;
        }
        self.elapsed_seconds += 1;
        if self.elapsed_seconds >= self.config.max_duration_seconds {
            self.elapsed_seconds = self.config.max_duration_seconds;
            // Only reachable from Recording, so stop cannot fail here.
            let _ = self.stop(StopReason::MaxDuration);
            return TickOutcome::AutoStopped(self.elapsed_seconds);
        }
        TickOutcome::Advanced(self.elapsed_seconds)
    }

    /// Append a captured chunk. Chunks are only collected while Recording;
    /// anything arriving in another state is dropped.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        if self.state == SessionState::Recording && !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    /// Hand the finalized blob to the caller.
    ///
    /// Rejected while the clip is shorter than the configured minimum; the
    /// error carries how much more is needed so the frontend can say so.
    pub fn accept(&self) -> Result<&[u8], SessionError> {
        match self.state {
            SessionState::Stopped => {
                let required = self.config.min_duration_seconds;
                if self.elapsed_seconds < required {
                    return Err(SessionError::ClipTooShort {
                        elapsed: self.elapsed_seconds,
                        required,
                        remaining: required - self.elapsed_seconds,
                    });
                }
                // Stopped implies the blob exists.
                Ok(self.output.as_deref().unwrap_or(&[]))
            }
            from => Err(SessionError::InvalidTransition {
                from,
                action: "accept",
            }),
        }
    }

    /// Discard the finished clip and return to Ready on the same stream.
    ///
    /// `stream_live` reflects whether the device stream is still open; when
    /// it is not, the caller has to re-acquire instead.
    pub fn discard_and_retry(&mut self, stream_live: bool) -> Result<(), SessionError> {
        match self.state {
            SessionState::Stopped => {
                if !stream_live {
                    return Err(SessionError::StreamGone);
                }
                self.state = SessionState::Ready;
                self.elapsed_seconds = 0;
                self.chunks.clear();
                self.output = None;
                self.stop_reason = None;
                self.stopped_at = None;
                Ok(())
            }
            from => Err(SessionError::InvalidTransition {
                from,
                action: "retry",
            }),
        }
    }

    /// Unrecoverable failure mid-session. Partial chunks are discarded
    /// since the output would be incomplete.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("Capture session {} failed: {}", self.id, message);
        self.state = SessionState::Errored;
        self.error = Some(message);
        self.chunks.clear();
        self.output = None;
    }

    /// Full reset back to Idle, dropping everything.
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.elapsed_seconds = 0;
        self.chunks.clear();
        self.output = None;
        self.stop_reason = None;
        self.error = None;
        self.started_at = None;
        self.stopped_at = None;
    }

    /// Snapshot for the frontend
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            elapsed_seconds: self.elapsed_seconds,
            min_duration_seconds: self.config.min_duration_seconds,
            max_duration_seconds: self.config.max_duration_seconds,
            stop_reason: self.stop_reason,
            error: self.error.clone(),
            output_bytes: self.output.as_ref().map(|b| b.len()),
            started_at: self.started_at,
            stopped_at: self.stopped_at,
        }
    }

    #[cfg(test)]
    pub(crate) fn has_output(&self) -> bool {
        self.output.is_some()
    }

    #[cfg(test)]
    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: u32, max: u32) -> SessionConfig {
        SessionConfig {
            min_duration_seconds: min,
            max_duration_seconds: max,
            ..SessionConfig::default()
        }
    }

    fn ready_session(min: u32, max: u32) -> CaptureSession {
        let mut session = CaptureSession::new(config(min, max));
        session.begin_acquire().unwrap();
        session.stream_ready().unwrap();
        session
    }

    #[test]
    fn elapsed_advances_only_while_recording() {
        let mut session = ready_session(5, 60);

        // Ticks before start are ignored.
        assert_eq!(session.on_tick(), TickOutcome::Ignored);
        assert_eq!(session.elapsed_seconds(), 0);

        session.start().unwrap();
        for i in 1..=10 {
            assert_eq!(session.on_tick(), TickOutcome::Advanced(i));
        }
        assert_eq!(session.elapsed_seconds(), 10);

        // Paused freezes the count no matter how many ticks arrive.
        session.pause().unwrap();
        for _ in 0..20 {
            assert_eq!(session.on_tick(), TickOutcome::Ignored);
        }
        assert_eq!(session.elapsed_seconds(), 10);

        session.resume().unwrap();
        for _ in 0..25 {
            session.on_tick();
        }
        assert_eq!(session.elapsed_seconds(), 35);

        session.stop(StopReason::Manual).unwrap();
        assert_eq!(session.on_tick(), TickOutcome::Ignored);
        assert_eq!(session.elapsed_seconds(), 35);
    }

    #[test]
    fn auto_stop_at_max_duration() {
        let mut session = ready_session(30, 90);
        session.start().unwrap();

        // 95 wall-clock-equivalent ticks; the session must cap at 90.
        let mut auto_stopped = false;
        for _ in 0..95 {
            if let TickOutcome::AutoStopped(at) = session.on_tick() {
                assert_eq!(at, 90);
                auto_stopped = true;
            }
        }
        assert!(auto_stopped);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.elapsed_seconds(), 90);
        assert_eq!(session.snapshot().stop_reason, Some(StopReason::MaxDuration));
        assert!(session.accept().is_ok());
    }

    #[test]
    fn accept_rejected_below_minimum_for_every_value() {
        for recorded in 0..30 {
            let mut session = ready_session(30, 90);
            session.start().unwrap();
            for _ in 0..recorded {
                session.on_tick();
            }
            session.stop(StopReason::Manual).unwrap();

            match session.accept() {
                Err(SessionError::ClipTooShort { remaining, .. }) => {
                    assert_eq!(remaining, 30 - recorded);
                }
                other => panic!("expected ClipTooShort at {}s, got {:?}", recorded, other.map(<[u8]>::len)),
            }
        }
    }

    #[test]
    fn accept_reports_one_more_second_needed() {
        let mut session = ready_session(30, 90);
        session.start().unwrap();
        for _ in 0..29 {
            session.on_tick();
        }
        session.stop(StopReason::Manual).unwrap();

        let err = session.accept().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("1s more needed"), "message was: {}", message);
    }

    #[test]
    fn output_defined_iff_stopped() {
        let mut session = ready_session(1, 60);
        assert!(!session.has_output());

        session.start().unwrap();
        session.push_chunk(vec![1, 2, 3]);
        session.on_tick();
        assert!(!session.has_output());

        session.pause().unwrap();
        assert!(!session.has_output());

        session.stop(StopReason::Manual).unwrap();
        assert!(session.has_output());
        assert_eq!(session.accept().unwrap(), &[1, 2, 3]);

        session.discard_and_retry(true).unwrap();
        assert!(!session.has_output());
    }

    #[test]
    fn blob_concatenates_chunks_in_order() {
        let mut session = ready_session(0, 60);
        session.start().unwrap();
        session.push_chunk(vec![1]);
        session.push_chunk(vec![2, 3]);
        session.push_chunk(Vec::new()); // empty reads are dropped
        session.push_chunk(vec![4]);
        session.stop(StopReason::Manual).unwrap();
        assert_eq!(session.accept().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn chunks_ignored_outside_recording() {
        let mut session = ready_session(0, 60);
        session.push_chunk(vec![9]);
        assert_eq!(session.chunk_count(), 0);

        session.start().unwrap();
        session.push_chunk(vec![1]);
        session.pause().unwrap();
        session.push_chunk(vec![2]);
        assert_eq!(session.chunk_count(), 1);

        session.resume().unwrap();
        session.push_chunk(vec![3]);
        session.stop(StopReason::Manual).unwrap();
        assert_eq!(session.accept().unwrap(), &[1, 3]);
    }

    #[test]
    fn retry_then_start_gives_fresh_session() {
        let mut session = ready_session(10, 90);
        session.start().unwrap();
        for _ in 0..40 {
            session.on_tick();
        }
        session.push_chunk(vec![7; 16]);
        session.stop(StopReason::Manual).unwrap();
        assert!(session.has_output());

        session.discard_and_retry(true).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.elapsed_seconds(), 0);
        assert!(!session.has_output());

        session.start().unwrap();
        assert_eq!(session.elapsed_seconds(), 0);
        assert_eq!(session.chunk_count(), 0);
    }

    #[test]
    fn retry_requires_live_stream() {
        let mut session = ready_session(0, 60);
        session.start().unwrap();
        session.stop(StopReason::Manual).unwrap();

        assert!(matches!(
            session.discard_and_retry(false),
            Err(SessionError::StreamGone)
        ));
        // Still Stopped; the caller decides whether to re-acquire.
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn acquisition_failure_blocks_start_until_fresh_acquire() {
        let mut session = CaptureSession::new(config(10, 90));
        session.begin_acquire().unwrap();
        session.acquire_failed("Camera/microphone access denied");

        assert_eq!(session.state(), SessionState::Errored);
        assert!(session.snapshot().error.is_some());
        assert!(session.start().is_err());
        assert!(session.pause().is_err());
        assert!(session.stop(StopReason::Manual).is_err());

        // A fresh successful acquisition clears the error and unblocks.
        session.begin_acquire().unwrap();
        session.stream_ready().unwrap();
        assert!(session.snapshot().error.is_none());
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Recording);
    }

    #[test]
    fn mid_recording_failure_discards_partial_chunks() {
        let mut session = ready_session(0, 60);
        session.start().unwrap();
        session.push_chunk(vec![1, 2, 3]);
        session.fail("Capture device disconnected");

        assert_eq!(session.state(), SessionState::Errored);
        assert_eq!(session.chunk_count(), 0);
        assert!(!session.has_output());
        assert!(session.accept().is_err());
    }

    #[test]
    fn stop_unreachable_outside_recording_or_paused() {
        let mut session = ready_session(0, 60);
        assert!(session.stop(StopReason::Manual).is_err());

        session.start().unwrap();
        session.stop(StopReason::Manual).unwrap();
        // Double stop is rejected too.
        assert!(session.stop(StopReason::Manual).is_err());
    }
}
