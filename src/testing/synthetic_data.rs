//! Deterministic image payloads for offline tests.
//!
//! Frames carry a luma gradient that shifts with the frame number, so a
//! consumer can tell consecutive frames apart without real hardware.

use crate::exif;
use crate::types::Size;

/// Fill `buffer` with an NV21 image of `width` columns.
pub fn fill_nv21(buffer: &mut [u8], frame_number: u64, width: u32) {
    let base = (frame_number % 256) as u8;
    let width = width.max(1) as usize;
    for (i, byte) in buffer.iter_mut().enumerate() {
        let (x, y) = (i % width, i / width);
        *byte = base.wrapping_add(((x + y) % 256) as u8);
    }
}

/// A complete NV21 frame of `size`, chroma set to neutral grey.
pub fn synthetic_nv21_frame(frame_number: u64, size: Size) -> Vec<u8> {
    let (w, h) = (size.width as usize, size.height as usize);
    let luma = w * h;
    let mut data = vec![128u8; luma + 2 * (w / 2) * (h / 2)];
    fill_nv21(&mut data[..luma], frame_number, size.width);
    data
}

/// JPEG payload whose only content is an EXIF orientation tag, enough for
/// rotation extraction.
pub fn synthetic_jpeg(orientation: u16) -> Vec<u8> {
    let mut jpeg = exif::orientation_segment(orientation, false);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}
