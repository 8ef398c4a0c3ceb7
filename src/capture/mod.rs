//! Device capture layer
//!
//! This module provides camera and microphone acquisition behind the
//! `CaptureDevice`/`DeviceStream` traits, plus device enumeration.

pub mod devices;
pub mod traits;

pub use devices::{get_cameras, get_microphones, NativeCaptureDevice};
pub use traits::{
    AcquireError, CameraInfo, CaptureDevice, DeviceStream, FacingMode, MicrophoneInfo, Resolution,
    StreamConstraints, StreamError,
};
