//! Value types shared by the controller, the reconciler and the collaborators.
//!
//! Everything here is plain data: user-facing setting enums, geometry and
//! geolocation. Native (hardware) representations live in
//! [`crate::reconcile::native`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which physical camera the session should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    #[default]
    Back,
    Front,
}

/// Flash behaviour for still captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Flash {
    #[default]
    Off,
    On,
    Auto,
    Torch,
}

/// White balance presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WhiteBalance {
    #[default]
    Auto,
    Incandescent,
    Fluorescent,
    Daylight,
    Cloudy,
}

/// High dynamic range scene mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Hdr {
    #[default]
    Off,
    On,
}

/// Session mode. Full resolution stills need `Picture`, recordings need `Video`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Picture,
    Video,
}

/// Whether recordings carry an audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Audio {
    Off,
    #[default]
    On,
}

/// Video codec selection. `Device` defers to the camcorder profile the hardware reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoCodec {
    #[default]
    Device,
    H263,
    H264,
}

/// Pixel formats the hardware may deliver preview frames in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageFormat {
    #[default]
    Nv21,
    Yv12,
    Yuy2,
    Jpeg,
}

impl ImageFormat {
    /// Bits used per pixel, as reported by the legacy API.
    pub fn bits_per_pixel(&self) -> u32 {
        match self {
            ImageFormat::Nv21 => 12,
            ImageFormat::Yv12 => 12,
            ImageFormat::Yuy2 => 16,
            ImageFormat::Jpeg => 0,
        }
    }
}

/// Coordinate systems used when computing rotation offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    Sensor,
    View,
    Output,
}

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Same size with swapped axes.
    pub fn flip(&self) -> Self {
        Self::new(self.height, self.width)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        AspectRatio::of(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A reduced aspect ratio, e.g. 16:9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    x: u32,
    y: u32,
}

impl AspectRatio {
    /// Build a ratio, reducing it by the greatest common divisor.
    ///
    /// Degenerate inputs (a zero side) reduce to 0:1 or 1:0 instead of panicking.
    pub fn of(x: u32, y: u32) -> Self {
        let divisor = gcd(x, y).max(1);
        Self {
            x: x / divisor,
            y: y / divisor,
        }
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn inverse(&self) -> Self {
        Self { x: self.y, y: self.x }
    }

    pub fn to_f32(&self) -> f32 {
        if self.y == 0 {
            return f32::INFINITY;
        }
        self.x as f32 / self.y as f32
    }

    /// True when `size` reduces to exactly this ratio.
    pub fn matches(&self, size: Size) -> bool {
        size.aspect_ratio() == *self
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// A point in view coordinates, typically a touch location.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Geolocation attached to captures and written into the GPS parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Fix time in milliseconds since the unix epoch.
    pub time_ms: i64,
    pub provider: String,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: 0.0,
            time_ms: chrono::Utc::now().timestamp_millis(),
            provider: "unknown".to_string(),
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_reduces() {
        let ratio = AspectRatio::of(1920, 1080);
        assert_eq!(ratio.x(), 16);
        assert_eq!(ratio.y(), 9);
        assert_eq!(ratio.to_string(), "16:9");
        assert_eq!(ratio.inverse(), AspectRatio::of(9, 16));
    }

    #[test]
    fn test_aspect_ratio_matches_size() {
        let ratio = AspectRatio::of(4, 3);
        assert!(ratio.matches(Size::new(640, 480)));
        assert!(!ratio.matches(Size::new(1280, 720)));
    }

    #[test]
    fn test_aspect_ratio_degenerate() {
        let ratio = AspectRatio::of(0, 0);
        assert_eq!(ratio.x(), 0);
        assert!(AspectRatio::of(5, 0).to_f32().is_infinite());
    }

    #[test]
    fn test_size_flip_and_area() {
        let size = Size::new(640, 480);
        assert_eq!(size.flip(), Size::new(480, 640));
        assert_eq!(size.area(), 307_200);
        assert_eq!(size.to_string(), "640x480");
    }

    #[test]
    fn test_bits_per_pixel() {
        assert_eq!(ImageFormat::Nv21.bits_per_pixel(), 12);
        assert_eq!(ImageFormat::Yuy2.bits_per_pixel(), 16);
    }

    #[test]
    fn test_setting_defaults() {
        assert_eq!(Facing::default(), Facing::Back);
        assert_eq!(Flash::default(), Flash::Off);
        assert_eq!(Mode::default(), Mode::Picture);
        assert_eq!(Audio::default(), Audio::On);
    }
}
