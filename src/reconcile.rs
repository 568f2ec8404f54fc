//! Parameter reconciliation.
//!
//! Every function here is pure: given a requested value, the previously
//! accepted value and the capability snapshot, it decides whether the
//! request is accepted (and what native value the hardware should receive)
//! or rejected (and which accepted value to roll back to). Applying the
//! result and notifying listeners is the controller's job.

use crate::capabilities::CameraOptions;
use crate::hardware::{CameraInfo, GpsTag};
use crate::types::{Facing, Flash, Hdr, Location, Mode, WhiteBalance};

/// Outcome of reconciling one setting change.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled<T, N> {
    /// The request is supported; `N` is what the hardware should receive.
    Accepted(N),
    /// The request is unsupported; the setting goes back to `rollback_to`.
    Rejected { rollback_to: T },
}

impl<T, N> Reconciled<T, N> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Reconciled::Accepted(_))
    }

    pub fn accepted(&self) -> Option<&N> {
        match self {
            Reconciled::Accepted(native) => Some(native),
            Reconciled::Rejected { .. } => None,
        }
    }
}

/// Native representations used by the legacy parameter block.
pub mod native {
    use crate::types::{Flash, Hdr, WhiteBalance};

    pub const FLASH_OFF: &str = "off";
    pub const FLASH_ON: &str = "on";
    pub const FLASH_AUTO: &str = "auto";
    pub const FLASH_TORCH: &str = "torch";

    pub const WHITE_BALANCE_AUTO: &str = "auto";
    pub const WHITE_BALANCE_INCANDESCENT: &str = "incandescent";
    pub const WHITE_BALANCE_FLUORESCENT: &str = "fluorescent";
    pub const WHITE_BALANCE_DAYLIGHT: &str = "daylight";
    pub const WHITE_BALANCE_CLOUDY: &str = "cloudy-daylight";

    pub const SCENE_MODE_AUTO: &str = "auto";
    pub const SCENE_MODE_HDR: &str = "hdr";

    pub const FOCUS_MODE_AUTO: &str = "auto";
    pub const FOCUS_MODE_CONTINUOUS_PICTURE: &str = "continuous-picture";
    pub const FOCUS_MODE_CONTINUOUS_VIDEO: &str = "continuous-video";
    pub const FOCUS_MODE_INFINITY: &str = "infinity";
    pub const FOCUS_MODE_FIXED: &str = "fixed";

    pub fn map_flash(flash: Flash) -> &'static str {
        match flash {
            Flash::Off => FLASH_OFF,
            Flash::On => FLASH_ON,
            Flash::Auto => FLASH_AUTO,
            Flash::Torch => FLASH_TORCH,
        }
    }

    pub fn unmap_flash(value: &str) -> Option<Flash> {
        match value {
            FLASH_OFF => Some(Flash::Off),
            FLASH_ON => Some(Flash::On),
            FLASH_AUTO => Some(Flash::Auto),
            FLASH_TORCH => Some(Flash::Torch),
            _ => None,
        }
    }

    pub fn map_white_balance(white_balance: WhiteBalance) -> &'static str {
        match white_balance {
            WhiteBalance::Auto => WHITE_BALANCE_AUTO,
            WhiteBalance::Incandescent => WHITE_BALANCE_INCANDESCENT,
            WhiteBalance::Fluorescent => WHITE_BALANCE_FLUORESCENT,
            WhiteBalance::Daylight => WHITE_BALANCE_DAYLIGHT,
            WhiteBalance::Cloudy => WHITE_BALANCE_CLOUDY,
        }
    }

    pub fn unmap_white_balance(value: &str) -> Option<WhiteBalance> {
        match value {
            WHITE_BALANCE_AUTO => Some(WhiteBalance::Auto),
            WHITE_BALANCE_INCANDESCENT => Some(WhiteBalance::Incandescent),
            WHITE_BALANCE_FLUORESCENT => Some(WhiteBalance::Fluorescent),
            WHITE_BALANCE_DAYLIGHT => Some(WhiteBalance::Daylight),
            WHITE_BALANCE_CLOUDY => Some(WhiteBalance::Cloudy),
            _ => None,
        }
    }

    pub fn map_hdr(hdr: Hdr) -> &'static str {
        match hdr {
            Hdr::Off => SCENE_MODE_AUTO,
            Hdr::On => SCENE_MODE_HDR,
        }
    }

    pub fn unmap_hdr(value: &str) -> Option<Hdr> {
        match value {
            SCENE_MODE_AUTO => Some(Hdr::Off),
            SCENE_MODE_HDR => Some(Hdr::On),
            _ => None,
        }
    }
}

pub fn flash(requested: Flash, previous: Flash, options: &CameraOptions) -> Reconciled<Flash, &'static str> {
    if options.supports_flash(requested) {
        Reconciled::Accepted(native::map_flash(requested))
    } else {
        Reconciled::Rejected {
            rollback_to: previous,
        }
    }
}

pub fn white_balance(
    requested: WhiteBalance,
    previous: WhiteBalance,
    options: &CameraOptions,
) -> Reconciled<WhiteBalance, &'static str> {
    if options.supports_white_balance(requested) {
        Reconciled::Accepted(native::map_white_balance(requested))
    } else {
        Reconciled::Rejected {
            rollback_to: previous,
        }
    }
}

pub fn hdr(requested: Hdr, previous: Hdr, options: &CameraOptions) -> Reconciled<Hdr, &'static str> {
    if options.supports_hdr(requested) {
        Reconciled::Accepted(native::map_hdr(requested))
    } else {
        Reconciled::Rejected {
            rollback_to: previous,
        }
    }
}

/// Accepted zoom: the clamped logical value and the native zoom index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLevel {
    pub value: f32,
    pub index: u32,
}

/// Zoom is a fraction of the maximum zoom, clamped into `[0, 1]`.
pub fn zoom(requested: f32, previous: f32, options: &CameraOptions) -> Reconciled<f32, ZoomLevel> {
    if !options.is_zoom_supported() || requested.is_nan() {
        return Reconciled::Rejected {
            rollback_to: previous,
        };
    }
    let value = requested.clamp(0.0, 1.0);
    let index = (value * options.max_zoom() as f32).round() as u32;
    Reconciled::Accepted(ZoomLevel {
        value,
        index: index.min(options.max_zoom()),
    })
}

/// Accepted exposure correction: the clamped EV value and its native index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureLevel {
    pub value: f32,
    pub index: i32,
}

/// Exposure correction in EV, clamped into the snapshot's `[min, max]`.
pub fn exposure_correction(
    requested: f32,
    previous: f32,
    options: &CameraOptions,
) -> Reconciled<f32, ExposureLevel> {
    let min = options.exposure_correction_min();
    let max = options.exposure_correction_max();
    if !options.is_exposure_correction_supported() || requested.is_nan() || min > max {
        return Reconciled::Rejected {
            rollback_to: previous,
        };
    }
    let value = requested.clamp(min, max);
    let index = (value / options.exposure_correction_step()).round() as i32;
    Reconciled::Accepted(ExposureLevel { value, index })
}

/// Shutter sound. `Some(enabled)` when the hardware toggle must be called,
/// `None` when the request is satisfied without touching the hardware.
///
/// Cameras that cannot silence the shutter only accept `true`.
pub fn play_sounds(requested: bool, previous: bool, can_disable: bool) -> Reconciled<bool, Option<bool>> {
    if can_disable {
        Reconciled::Accepted(Some(requested))
    } else if requested {
        Reconciled::Accepted(None)
    } else {
        Reconciled::Rejected {
            rollback_to: previous,
        }
    }
}

/// Physical camera picked for a facing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSelection {
    pub camera_id: usize,
    pub info: CameraInfo,
}

/// Resolve `requested` to the first physical camera with that facing.
pub fn facing(requested: Facing, previous: Facing, cameras: &[CameraInfo]) -> Reconciled<Facing, CameraSelection> {
    cameras
        .iter()
        .position(|info| info.facing == requested)
        .map(|camera_id| {
            Reconciled::Accepted(CameraSelection {
                camera_id,
                info: cameras[camera_id].clone(),
            })
        })
        .unwrap_or(Reconciled::Rejected {
            rollback_to: previous,
        })
}

/// Location is always accepted; `None` leaves the GPS block untouched.
pub fn location(requested: Option<&Location>) -> Option<GpsTag> {
    requested.map(|location| GpsTag {
        latitude: location.latitude,
        longitude: location.longitude,
        altitude: location.altitude,
        timestamp_ms: location.time_ms,
        processing_method: location.provider.clone(),
    })
}

/// Best internal focus mode for the session mode, if the camera offers any.
pub fn default_focus_mode(mode: Mode, supported: &[String]) -> Option<&'static str> {
    let offers = |name: &str| supported.iter().any(|m| m == name);
    if mode == Mode::Video && offers(native::FOCUS_MODE_CONTINUOUS_VIDEO) {
        return Some(native::FOCUS_MODE_CONTINUOUS_VIDEO);
    }
    [
        native::FOCUS_MODE_CONTINUOUS_PICTURE,
        native::FOCUS_MODE_INFINITY,
        native::FOCUS_MODE_FIXED,
    ]
    .into_iter()
    .find(|name| offers(name))
}
