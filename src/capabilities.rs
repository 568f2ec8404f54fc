//! Capability snapshot built once per opened session.

use crate::hardware::{CameraInfo, Parameters};
use crate::reconcile::native;
use crate::types::{AspectRatio, Facing, Flash, Hdr, Size, WhiteBalance};
use serde::Serialize;

/// Immutable description of what the opened camera supports.
///
/// Sizes are expressed in view coordinates: when the sensor is rotated
/// relative to the view they are flipped at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraOptions {
    facing: Facing,
    supported_facing: Vec<Facing>,
    supported_flash: Vec<Flash>,
    supported_white_balance: Vec<WhiteBalance>,
    supported_hdr: Vec<Hdr>,
    supported_picture_sizes: Vec<Size>,
    supported_picture_aspect_ratios: Vec<AspectRatio>,
    zoom_supported: bool,
    max_zoom: u32,
    auto_focus_supported: bool,
    exposure_correction_supported: bool,
    exposure_correction_min: f32,
    exposure_correction_max: f32,
    exposure_correction_step: f32,
    can_disable_shutter_sound: bool,
}

impl CameraOptions {
    /// Build the snapshot from the parameters of the opened camera.
    ///
    /// `cameras` is the full list of physical cameras, used for the facing
    /// choices; `flip` tells whether sensor and view axes are swapped.
    pub fn new(params: &Parameters, opened: &CameraInfo, cameras: &[CameraInfo], flip: bool) -> Self {
        let mut supported_facing = Vec::new();
        for info in cameras {
            if !supported_facing.contains(&info.facing) {
                supported_facing.push(info.facing);
            }
        }

        let supported_flash = unmap_all(&params.supported_flash_modes, native::unmap_flash);
        let supported_white_balance =
            unmap_all(&params.supported_white_balance, native::unmap_white_balance);
        let supported_hdr = unmap_all(&params.supported_scene_modes, native::unmap_hdr);

        let mut supported_picture_sizes = Vec::new();
        let mut supported_picture_aspect_ratios = Vec::new();
        for size in &params.supported_picture_sizes {
            let size = if flip { size.flip() } else { *size };
            if !supported_picture_sizes.contains(&size) {
                supported_picture_sizes.push(size);
            }
            let ratio = size.aspect_ratio();
            if !supported_picture_aspect_ratios.contains(&ratio) {
                supported_picture_aspect_ratios.push(ratio);
            }
        }

        let exposure_correction_min =
            params.min_exposure_compensation as f32 * params.exposure_compensation_step;
        let exposure_correction_max =
            params.max_exposure_compensation as f32 * params.exposure_compensation_step;

        Self {
            facing: opened.facing,
            supported_facing,
            supported_flash,
            supported_white_balance,
            supported_hdr,
            supported_picture_sizes,
            supported_picture_aspect_ratios,
            zoom_supported: params.zoom_supported && params.max_zoom > 0,
            max_zoom: params.max_zoom,
            auto_focus_supported: params
                .supported_focus_modes
                .iter()
                .any(|mode| mode == native::FOCUS_MODE_AUTO),
            exposure_correction_supported: params.exposure_compensation_step > 0.0
                && (params.min_exposure_compensation != 0 || params.max_exposure_compensation != 0),
            exposure_correction_min,
            exposure_correction_max,
            exposure_correction_step: params.exposure_compensation_step,
            can_disable_shutter_sound: opened.can_disable_shutter_sound,
        }
    }

    /// Facing of the camera this snapshot was built from.
    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn supported_facing(&self) -> &[Facing] {
        &self.supported_facing
    }

    pub fn supported_flash(&self) -> &[Flash] {
        &self.supported_flash
    }

    pub fn supported_white_balance(&self) -> &[WhiteBalance] {
        &self.supported_white_balance
    }

    pub fn supported_hdr(&self) -> &[Hdr] {
        &self.supported_hdr
    }

    pub fn supported_picture_sizes(&self) -> &[Size] {
        &self.supported_picture_sizes
    }

    pub fn supported_picture_aspect_ratios(&self) -> &[AspectRatio] {
        &self.supported_picture_aspect_ratios
    }

    pub fn supports_facing(&self, facing: Facing) -> bool {
        self.supported_facing.contains(&facing)
    }

    pub fn supports_flash(&self, flash: Flash) -> bool {
        self.supported_flash.contains(&flash)
    }

    pub fn supports_white_balance(&self, white_balance: WhiteBalance) -> bool {
        self.supported_white_balance.contains(&white_balance)
    }

    pub fn supports_hdr(&self, hdr: Hdr) -> bool {
        self.supported_hdr.contains(&hdr)
    }

    pub fn is_zoom_supported(&self) -> bool {
        self.zoom_supported
    }

    /// Highest native zoom index.
    pub fn max_zoom(&self) -> u32 {
        self.max_zoom
    }

    pub fn is_auto_focus_supported(&self) -> bool {
        self.auto_focus_supported
    }

    pub fn is_exposure_correction_supported(&self) -> bool {
        self.exposure_correction_supported
    }

    pub fn exposure_correction_min(&self) -> f32 {
        self.exposure_correction_min
    }

    pub fn exposure_correction_max(&self) -> f32 {
        self.exposure_correction_max
    }

    /// EV represented by one native exposure compensation index.
    pub fn exposure_correction_step(&self) -> f32 {
        self.exposure_correction_step
    }

    pub fn can_disable_shutter_sound(&self) -> bool {
        self.can_disable_shutter_sound
    }
}

fn unmap_all<T: PartialEq>(natives: &[String], unmap: fn(&str) -> Option<T>) -> Vec<T> {
    let mut values = Vec::new();
    for value in natives.iter().filter_map(|name| unmap(name)) {
        if !values.contains(&value) {
            values.push(value);
        }
    }
    values
}
