//! Preview/capture size negotiation and crop geometry.

use crate::hardware::Rect;
use crate::types::{AspectRatio, Size};

/// Choose the preview stream size.
///
/// Sizes with exactly `target_ratio` win over any other; among the
/// remaining candidates the one whose area is closest to `target` is picked,
/// ties going to the earlier entry in `supported`.
pub fn compute_preview_size(supported: &[Size], target_ratio: AspectRatio, target: Size) -> Option<Size> {
    let matching: Vec<Size> = supported
        .iter()
        .copied()
        .filter(|size| target_ratio.matches(*size))
        .collect();
    let candidates = if matching.is_empty() {
        supported.to_vec()
    } else {
        matching
    };
    candidates
        .into_iter()
        .min_by_key(|size| size.area().abs_diff(target.area()))
}

/// Choose the full resolution capture size: the largest supported size,
/// restricted to `ratio` when any size has it and, for recordings, to
/// sizes that fit inside `limit`.
pub fn compute_capture_size(supported: &[Size], ratio: Option<AspectRatio>, limit: Option<Size>) -> Option<Size> {
    let mut candidates: Vec<Size> = supported.to_vec();
    if let Some(limit) = limit {
        let fitting: Vec<Size> = candidates
            .iter()
            .copied()
            .filter(|size| fits_within(*size, limit))
            .collect();
        if !fitting.is_empty() {
            candidates = fitting;
        }
    }
    if let Some(ratio) = ratio {
        let matching: Vec<Size> = candidates
            .iter()
            .copied()
            .filter(|size| ratio.matches(*size))
            .collect();
        if !matching.is_empty() {
            candidates = matching;
        }
    }
    candidates.into_iter().max_by_key(|size| size.area())
}

fn fits_within(size: Size, limit: Size) -> bool {
    let (long, short) = (size.width.max(size.height), size.width.min(size.height));
    let (limit_long, limit_short) = (limit.width.max(limit.height), limit.width.min(limit.height));
    long <= limit_long && short <= limit_short
}

/// Largest centered rectangle of `target` ratio inside `current`.
pub fn compute_crop(current: Size, target: AspectRatio) -> Rect {
    let width = current.width as i32;
    let height = current.height as i32;
    if target.matches(current) || target.x() == 0 || target.y() == 0 {
        return Rect::new(0, 0, width, height);
    }

    if current.aspect_ratio().to_f32() > target.to_f32() {
        let crop_width = (height as f32 * target.to_f32()) as i32;
        let x = (width - crop_width) / 2;
        Rect::new(x, 0, x + crop_width, height)
    } else {
        let crop_height = (width as f32 / target.to_f32()) as i32;
        let y = (height - crop_height) / 2;
        Rect::new(0, y, width, y + crop_height)
    }
}
