//! Presentation surface contract.
//!
//! The surface belongs to the UI layer. The controller only reads its
//! readiness and geometry and hands its output to the hardware.

use crate::types::Size;
use serde::{Deserialize, Serialize};

/// Opaque identifier of a UI-owned surface object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

/// What the hardware should render preview into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreviewOutput {
    /// A display surface holder.
    Display(SurfaceId),
    /// A texture sampled by the UI renderer.
    Texture(SurfaceId),
}

pub trait PreviewSurface: Send + Sync {
    fn is_ready(&self) -> bool;
    /// Current surface size in view coordinates.
    fn surface_size(&self) -> Size;
    fn output(&self) -> PreviewOutput;
    /// Preview stream size in view coordinates, so the surface can scale/crop.
    fn set_desired_size(&self, _size: Size) {}
}
