//! Capture session module
//!
//! This module implements the clip-capture workflow:
//! - CaptureSession, the single tagged-state machine for one attempt
//! - CaptureController to orchestrate the device stream and timers
//! - IntervalTimer, the owned cancellable timer both run on

pub mod clock;
pub mod controller;
pub mod session;
pub mod state;

pub use clock::IntervalTimer;
pub use controller::{CaptureController, CaptureEvent};
pub use session::{CaptureSession, SessionError, TickOutcome};
pub use state::{ClipOutput, SessionConfig, SessionSnapshot, SessionState, StopReason};
