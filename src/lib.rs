//! camera-session: a serialized session controller for legacy single-camera hardware APIs
//!
//! The crate turns a callback-driven camera handle (open/parameters/preview
//! buffers/take picture) into a session with a predictable lifecycle. All
//! hardware work happens on one worker thread; callers issue intents that
//! return immediately and learn about outcomes through a [`CameraListener`].
//!
//! # Features
//! - Open/close lifecycle with automatic preview binding once the surface is ready
//! - Settings reconciled against the camera's capabilities, with rollback on rejection
//! - Full resolution stills, preview snapshots and video recording
//! - Tap-to-focus with metering areas, timeout and automatic reset
//! - Pooled preview frame delivery
//!
//! # Usage
//! ```rust,ignore
//! use camera_session::{SessionController, testing::{FakeProvider, FakeSurface, RecordingListener}};
//! use std::sync::Arc;
//!
//! camera_session::init_logging();
//! let controller = SessionController::builder(Arc::new(FakeProvider::new()))
//!     .with_listener(Arc::new(RecordingListener::new()))
//!     .with_surface(Arc::new(FakeSurface::new(camera_session::Size::new(1080, 1920))))
//!     .build()?;
//! controller.open().wait();
//! controller.capture_photo();
//! ```

pub mod capabilities;
pub mod capture;
pub mod config;
pub mod controller;
pub mod errors;
pub mod exif;
pub mod focus;
pub mod frame;
pub mod hardware;
pub mod invariant;
pub mod listener;
pub mod orientation;
pub mod preview;
pub mod reconcile;
pub mod registry;
pub mod sizes;
pub mod snapshot;
pub mod types;
pub mod video;
pub mod worker;

// Testing utilities - in-memory hardware for offline testing
pub mod testing;

// Re-exports for convenience
pub use capabilities::CameraOptions;
pub use capture::{PictureResult, VideoResult, VideoTermination};
pub use config::SessionConfig;
pub use controller::{SessionController, SessionControllerBuilder, SessionState};
pub use errors::{CameraError, CameraException, ErrorReason};
pub use frame::Frame;
pub use hardware::{CameraDevice, CameraInfo, CameraProvider, DeviceEvent, HardwareErrorCode, Parameters};
pub use listener::{CameraListener, FrameConsumer};
pub use preview::{PreviewOutput, PreviewSurface};
pub use registry::CameraRegistry;
pub use types::{
    AspectRatio, Audio, Facing, Flash, Hdr, ImageFormat, Location, Mode, PointF, Reference, Size,
    VideoCodec, WhiteBalance,
};
pub use video::{EncoderProvider, VideoEncoder};
pub use worker::CompletionSignal;

/// Initialize logging for the camera session
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "camera_session=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "camera-session");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
