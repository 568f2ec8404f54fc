//! Snapshot post-processing: turn one NV21 preview frame into a JPEG.
//!
//! Runs on a post-processing thread and never touches the hardware.

use crate::errors::CameraError;
use crate::sizes::compute_crop;
use crate::types::{AspectRatio, Size};
use image::{DynamicImage, RgbImage};

/// Input for one snapshot encode.
#[derive(Debug, Clone)]
pub struct SnapshotJob {
    pub data: Vec<u8>,
    /// Preview size in sensor coordinates.
    pub size: Size,
    /// Clockwise rotation from sensor to output.
    pub rotation: u32,
    /// Crop target in output coordinates.
    pub crop: Option<AspectRatio>,
    pub quality: u8,
}

/// Encoded snapshot. Pixels are already upright so no rotation is left to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSnapshot {
    pub jpeg: Vec<u8>,
    pub size: Size,
}

fn nv21_len(size: Size) -> usize {
    let (w, h) = (size.width as usize, size.height as usize);
    w * h + 2 * (w / 2) * (h / 2)
}

fn check_nv21(data: &[u8], size: Size) -> Result<(), CameraError> {
    if size.is_empty() || size.width % 2 != 0 || size.height % 2 != 0 {
        return Err(CameraError::EncodingError(format!("unsupported NV21 size {size}")));
    }
    if data.len() < nv21_len(size) {
        return Err(CameraError::EncodingError(format!(
            "NV21 buffer too small: {} bytes for {size}",
            data.len()
        )));
    }
    Ok(())
}

/// Rotate an NV21 image clockwise by a multiple of 90 degrees.
pub fn rotate_nv21(data: &[u8], size: Size, degrees: u32) -> Result<(Vec<u8>, Size), CameraError> {
    check_nv21(data, size)?;
    let degrees = degrees % 360;
    if degrees % 90 != 0 {
        return Err(CameraError::EncodingError(format!("invalid rotation {degrees}")));
    }
    let out_size = if degrees % 180 == 0 { size } else { size.flip() };
    if degrees == 0 {
        return Ok((data[..nv21_len(size)].to_vec(), size));
    }

    let (w, h) = (size.width as usize, size.height as usize);
    let out_w = out_size.width as usize;
    let map = |x: usize, y: usize, w: usize, h: usize| match degrees {
        90 => (h - 1 - y, x),
        180 => (w - 1 - x, h - 1 - y),
        _ => (y, w - 1 - x),
    };

    let mut out = vec![0u8; nv21_len(size)];
    for y in 0..h {
        for x in 0..w {
            let (ox, oy) = map(x, y, w, h);
            out[oy * out_w + ox] = data[y * w + x];
        }
    }

    let luma = w * h;
    let (cw, ch) = (w / 2, h / 2);
    let out_cw = out_w / 2;
    for y in 0..ch {
        for x in 0..cw {
            let (ox, oy) = map(x, y, cw, ch);
            let src = luma + (y * cw + x) * 2;
            let dst = luma + (oy * out_cw + ox) * 2;
            out[dst] = data[src];
            out[dst + 1] = data[src + 1];
        }
    }
    Ok((out, out_size))
}

/// BT.601 full range conversion.
pub fn nv21_to_rgb(data: &[u8], size: Size) -> Result<RgbImage, CameraError> {
    check_nv21(data, size)?;
    let (w, h) = (size.width as usize, size.height as usize);
    let luma = w * h;

    let mut rgb = Vec::with_capacity(luma * 3);
    for y in 0..h {
        for x in 0..w {
            let yv = f32::from(data[y * w + x]);
            let chroma = luma + (y / 2) * w + (x / 2) * 2;
            let v = f32::from(data[chroma]) - 128.0;
            let u = f32::from(data[chroma + 1]) - 128.0;
            rgb.push((yv + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((yv - 0.344_136 * u - 0.714_136 * v).clamp(0.0, 255.0) as u8);
            rgb.push((yv + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }
    RgbImage::from_vec(size.width, size.height, rgb)
        .ok_or_else(|| CameraError::EncodingError("failed to create image from frame data".into()))
}

/// Rotate upright, crop and compress a preview frame.
pub fn encode_snapshot(job: &SnapshotJob) -> Result<EncodedSnapshot, CameraError> {
    let (upright, size) = rotate_nv21(&job.data, job.size, job.rotation)?;
    let mut img = nv21_to_rgb(&upright, size)?;

    if let Some(ratio) = job.crop {
        let rect = compute_crop(size, ratio);
        img = image::imageops::crop_imm(
            &img,
            rect.left as u32,
            rect.top as u32,
            rect.width() as u32,
            rect.height() as u32,
        )
        .to_image();
    }
    let out_size = Size::new(img.width(), img.height());

    let mut jpeg = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, job.quality);
    DynamicImage::ImageRgb8(img)
        .write_with_encoder(encoder)
        .map_err(|e| CameraError::EncodingError(format!("JPEG encode failed: {e}")))?;

    log::debug!("snapshot encoded: {out_size}, {} bytes", jpeg.len());
    Ok(EncodedSnapshot { jpeg, size: out_size })
}
