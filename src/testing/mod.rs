//! Testing utilities for camera-session
//!
//! In-memory stand-ins for every collaborator of the controller, so
//! sessions can be driven end to end without a camera attached.

pub mod fake_camera;
pub mod fake_encoder;
pub mod recorder;
pub mod synthetic_data;

pub use fake_camera::{default_parameters, FakeCameraHandle, FakeCameraState, FakeDevice, FakeProvider};
pub use fake_encoder::{profile, EncoderLog, FakeEncoderProvider};
pub use recorder::{FakeSurface, FrameCollector, ListenerEvent, RecordingListener};
pub use synthetic_data::{fill_nv21, synthetic_jpeg, synthetic_nv21_frame};
