//! Abstraction over the legacy single-camera hardware API.
//!
//! The controller never talks to a concrete camera. It is handed a
//! [`CameraProvider`] that enumerates cameras and opens [`CameraDevice`]
//! handles. Asynchronous hardware notifications (preview buffers, shutter,
//! picture payloads, autofocus, errors) are delivered through
//! [`DeviceCallbacks`], which the controller marshals onto its serialized
//! worker.

use crate::preview::PreviewOutput;
use crate::types::{Facing, ImageFormat, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Static description of one physical camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub facing: Facing,
    /// Clockwise angle the sensor image must be rotated to be upright.
    pub orientation: u32,
    pub can_disable_shutter_sound: bool,
}

/// Rectangle in the driver's [-1000, 1000] metering coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeteringArea {
    pub rect: Rect,
    pub weight: u32,
}

/// GPS fields written into the still-capture parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsTag {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub timestamp_ms: i64,
    pub processing_method: String,
}

/// Mutable parameter block of an open camera, mirroring the legacy API.
///
/// The `supported_*` lists and ranges are reported by the driver; the
/// remaining fields are the currently configured values. String-valued modes
/// use the driver's native names (see [`crate::reconcile::native`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub supported_preview_sizes: Vec<Size>,
    pub supported_picture_sizes: Vec<Size>,
    pub supported_flash_modes: Vec<String>,
    pub supported_white_balance: Vec<String>,
    pub supported_scene_modes: Vec<String>,
    pub supported_focus_modes: Vec<String>,
    pub zoom_supported: bool,
    pub max_zoom: u32,
    pub min_exposure_compensation: i32,
    pub max_exposure_compensation: i32,
    pub exposure_compensation_step: f32,
    pub max_num_focus_areas: u32,
    pub max_num_metering_areas: u32,

    pub preview_format: ImageFormat,
    pub preview_size: Option<Size>,
    pub picture_size: Option<Size>,
    pub flash_mode: Option<String>,
    pub white_balance: Option<String>,
    pub scene_mode: Option<String>,
    pub focus_mode: Option<String>,
    pub zoom: u32,
    pub exposure_compensation: i32,
    pub rotation: u32,
    pub recording_hint: bool,
    pub focus_areas: Vec<MeteringArea>,
    pub metering_areas: Vec<MeteringArea>,
    pub gps: Option<GpsTag>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            supported_preview_sizes: Vec::new(),
            supported_picture_sizes: Vec::new(),
            supported_flash_modes: Vec::new(),
            supported_white_balance: Vec::new(),
            supported_scene_modes: Vec::new(),
            supported_focus_modes: Vec::new(),
            zoom_supported: false,
            max_zoom: 0,
            min_exposure_compensation: 0,
            max_exposure_compensation: 0,
            exposure_compensation_step: 0.0,
            max_num_focus_areas: 0,
            max_num_metering_areas: 0,
            preview_format: ImageFormat::Nv21,
            preview_size: None,
            picture_size: None,
            flash_mode: None,
            white_balance: None,
            scene_mode: None,
            focus_mode: None,
            zoom: 0,
            exposure_compensation: 0,
            rotation: 0,
            recording_hint: false,
            focus_areas: Vec::new(),
            metering_areas: Vec::new(),
            gps: None,
        }
    }
}

/// Failure of a synchronous hardware call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareError {
    #[error("camera {0} is unavailable")]
    Unavailable(usize),
    #[error("camera is locked by the media encoder")]
    Locked,
    #[error("camera has been released")]
    Released,
    #[error("hardware call failed: {0}")]
    Failed(String),
}

/// Codes delivered through the asynchronous error callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HardwareErrorCode {
    /// The media server died. Recoverable by reopening the camera.
    ServerDied,
    /// Another client took the camera away.
    Evicted,
    Unknown(i32),
}

/// Asynchronous notification from an open camera.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A filled preview buffer previously queued with `add_callback_buffer`.
    PreviewFrame(Vec<u8>),
    /// The single frame requested with `set_one_shot_preview_callback`.
    OneShotFrame(Vec<u8>),
    Shutter,
    /// Encoded (JPEG) payload of a full resolution capture.
    PictureTaken(Vec<u8>),
    AutoFocus(bool),
    Error(HardwareErrorCode),
}

/// Sink handed to a device so it can report [`DeviceEvent`]s from any thread.
#[derive(Clone)]
pub struct DeviceCallbacks {
    sink: Arc<dyn Fn(DeviceEvent) + Send + Sync>,
}

impl DeviceCallbacks {
    pub fn new(sink: impl Fn(DeviceEvent) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn emit(&self, event: DeviceEvent) {
        (self.sink)(event);
    }

    pub fn preview_frame(&self, data: Vec<u8>) {
        self.emit(DeviceEvent::PreviewFrame(data));
    }

    pub fn one_shot_frame(&self, data: Vec<u8>) {
        self.emit(DeviceEvent::OneShotFrame(data));
    }

    pub fn shutter(&self) {
        self.emit(DeviceEvent::Shutter);
    }

    pub fn picture_taken(&self, jpeg: Vec<u8>) {
        self.emit(DeviceEvent::PictureTaken(jpeg));
    }

    pub fn auto_focus(&self, success: bool) {
        self.emit(DeviceEvent::AutoFocus(success));
    }

    pub fn error(&self, code: HardwareErrorCode) {
        self.emit(DeviceEvent::Error(code));
    }
}

impl fmt::Debug for DeviceCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCallbacks").finish_non_exhaustive()
    }
}

/// An open hardware camera handle.
///
/// Methods are only ever called from the controller's serialized worker, so
/// implementations need `Send` but not `Sync`.
pub trait CameraDevice: Send {
    /// Snapshot of the current parameter block.
    fn parameters(&self) -> Parameters;
    fn set_parameters(&mut self, params: &Parameters) -> Result<(), HardwareError>;

    /// Register the sink for every asynchronous notification.
    fn set_callbacks(&mut self, callbacks: DeviceCallbacks);

    /// Not allowed while preview is running.
    fn set_display_orientation(&mut self, degrees: u32) -> Result<(), HardwareError>;
    fn set_preview_output(&mut self, output: &PreviewOutput) -> Result<(), HardwareError>;

    /// Enable or disable buffered preview delivery. Disabling drops any queued buffers.
    fn set_preview_callback_enabled(&mut self, enabled: bool);
    fn add_callback_buffer(&mut self, buffer: Vec<u8>);
    /// Deliver the next preview frame once through [`DeviceEvent::OneShotFrame`].
    /// Buffered delivery is suspended, queued buffers kept, until
    /// `set_preview_callback_enabled(true)`.
    fn set_one_shot_preview_callback(&mut self);

    fn start_preview(&mut self) -> Result<(), HardwareError>;
    fn stop_preview(&mut self) -> Result<(), HardwareError>;

    /// Start a full resolution capture. Stops preview as a side effect.
    fn take_picture(&mut self) -> Result<(), HardwareError>;

    fn auto_focus(&mut self) -> Result<(), HardwareError>;
    fn cancel_auto_focus(&mut self);

    fn enable_shutter_sound(&mut self, enabled: bool) -> Result<(), HardwareError>;

    /// Take back exclusive control after a media encoder used the camera.
    fn lock(&mut self) -> Result<(), HardwareError>;
    /// Hand control to a media encoder.
    fn unlock(&mut self) -> Result<(), HardwareError>;

    fn release(&mut self) -> Result<(), HardwareError>;
}

/// Enumerates and opens physical cameras.
pub trait CameraProvider: Send + Sync {
    fn number_of_cameras(&self) -> usize;
    fn camera_info(&self, id: usize) -> Option<CameraInfo>;
    fn open(&self, id: usize) -> Result<Box<dyn CameraDevice>, HardwareError>;

    fn cameras(&self) -> Vec<CameraInfo> {
        (0..self.number_of_cameras())
            .filter_map(|id| self.camera_info(id))
            .collect()
    }
}
