//! Capture results and the still-capture state machine.

use crate::types::{Audio, AspectRatio, Facing, ImageFormat, Location, Size, VideoCodec};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Encoded still image handed to `on_picture_taken`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureResult {
    pub id: String,
    pub data: Vec<u8>,
    pub format: ImageFormat,
    /// Clockwise rotation a viewer must apply to show the image upright.
    pub rotation: u32,
    pub size: Size,
    pub facing: Facing,
    pub location: Option<Location>,
    pub is_snapshot: bool,
}

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoTermination {
    UserRequested,
    MaxDurationReached,
    MaxSizeReached,
}

/// Finished recording handed to `on_video_taken`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResult {
    pub id: String,
    pub file: PathBuf,
    pub rotation: u32,
    pub size: Size,
    pub codec: VideoCodec,
    pub audio: Audio,
    pub facing: Facing,
    pub location: Option<Location>,
    /// Bytes, 0 for unlimited.
    pub max_size: u64,
    /// Milliseconds, 0 for unlimited.
    pub max_duration: u64,
    pub termination: VideoTermination,
}

/// Stages of one still capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureStage {
    #[default]
    Idle,
    Requested,
    ShutterFired,
    Decoding,
    Dispatched,
}

/// Everything a capture needs to know at the moment it was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub id: String,
    pub is_snapshot: bool,
    pub facing: Facing,
    pub location: Option<Location>,
    /// Size of the delivered image before any rotation.
    pub size: Size,
    /// Crop target for snapshots.
    pub crop: Option<AspectRatio>,
}

impl CaptureRequest {
    pub fn new(is_snapshot: bool, facing: Facing, size: Size) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            is_snapshot,
            facing,
            location: None,
            size,
            crop: None,
        }
    }

    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    pub fn with_crop(mut self, crop: AspectRatio) -> Self {
        self.crop = Some(crop);
        self
    }
}

/// Tracks the single in-flight still capture, full resolution or snapshot.
#[derive(Debug, Default)]
pub struct StillCapture {
    stage: CaptureStage,
    request: Option<CaptureRequest>,
}

impl StillCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> CaptureStage {
        self.stage
    }

    pub fn in_flight(&self) -> bool {
        self.stage != CaptureStage::Idle
    }

    pub fn request(&self) -> Option<&CaptureRequest> {
        self.request.as_ref()
    }

    /// Start a capture. False (and nothing changes) if one is already in flight.
    pub fn begin(&mut self, request: CaptureRequest) -> bool {
        if self.in_flight() {
            return false;
        }
        log::debug!("still capture {} requested (snapshot: {})", request.id, request.is_snapshot);
        self.request = Some(request);
        self.stage = CaptureStage::Requested;
        true
    }

    /// Record the shutter. Returns whether the capture is a snapshot, or
    /// `None` when no capture is waiting for its shutter.
    pub fn shutter(&mut self) -> Option<bool> {
        if self.stage != CaptureStage::Requested {
            return None;
        }
        self.stage = CaptureStage::ShutterFired;
        self.request.as_ref().map(|request| request.is_snapshot)
    }

    /// The payload arrived. Some drivers skip the shutter notification, so
    /// `Requested` is accepted too.
    pub fn decoding(&mut self) -> Option<&CaptureRequest> {
        match self.stage {
            CaptureStage::Requested | CaptureStage::ShutterFired => {
                self.stage = CaptureStage::Decoding;
                self.request.as_ref()
            }
            _ => None,
        }
    }

    /// Build the result for capture `id`. `None` for a stale or unknown id.
    pub fn finish(&mut self, id: &str, data: Vec<u8>, rotation: u32, size: Size) -> Option<PictureResult> {
        if self.stage != CaptureStage::Decoding {
            return None;
        }
        let request = self.request.as_ref().filter(|request| request.id == id)?;
        let result = PictureResult {
            id: request.id.clone(),
            data,
            format: ImageFormat::Jpeg,
            rotation,
            size,
            facing: request.facing,
            location: request.location.clone(),
            is_snapshot: request.is_snapshot,
        };
        self.stage = CaptureStage::Dispatched;
        Some(result)
    }

    /// Back to idle, ready for the next capture.
    pub fn reset(&mut self) {
        self.stage = CaptureStage::Idle;
        self.request = None;
    }
}
