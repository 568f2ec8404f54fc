//! Outbound callbacks.
//!
//! All methods are invoked on the controller's worker thread. Every method
//! has a no-op default so listeners only implement what they need.

use crate::capabilities::CameraOptions;
use crate::capture::{PictureResult, VideoResult};
use crate::errors::CameraException;
use crate::frame::Frame;
use crate::types::{PointF, Size};

pub trait CameraListener: Send + Sync {
    fn on_camera_opened(&self, _options: &CameraOptions) {}
    fn on_camera_closed(&self) {}
    /// Preview stream size in view coordinates.
    fn on_preview_size_changed(&self, _size: Size) {}
    fn on_shutter(&self, _is_snapshot: bool) {}
    fn on_picture_taken(&self, _result: PictureResult) {}
    fn on_video_taken(&self, _result: VideoResult) {}
    fn on_zoom_changed(&self, _zoom: f32, _points: &[PointF]) {}
    fn on_exposure_correction_changed(&self, _value: f32, _bounds: [f32; 2], _points: &[PointF]) {}
    fn on_focus_start(&self, _point: PointF) {}
    fn on_focus_end(&self, _success: bool, _point: PointF) {}
    fn on_error(&self, _error: CameraException) {}
}

/// Receives preview frames. The frame's buffer stays on loan until the
/// frame is released or dropped.
pub trait FrameConsumer: Send + Sync {
    fn on_frame(&self, frame: Frame);
}

/// Listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl CameraListener for NoopListener {}
