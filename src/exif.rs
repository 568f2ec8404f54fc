//! Minimal EXIF reader: just enough of JPEG/TIFF to find the orientation tag.

use crate::errors::CameraError;

const ORIENTATION_TAG: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;

#[derive(Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, bytes: &[u8], offset: usize) -> Option<u16> {
        let raw: [u8; 2] = bytes.get(offset..offset + 2)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u16::from_le_bytes(raw),
            ByteOrder::Big => u16::from_be_bytes(raw),
        })
    }

    fn u32(self, bytes: &[u8], offset: usize) -> Option<u32> {
        let raw: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        })
    }
}

fn malformed(what: &str) -> CameraError {
    CameraError::EncodingError(format!("malformed EXIF: {what}"))
}

/// Read the raw EXIF orientation value (1..=8) from a JPEG.
pub fn read_orientation(jpeg: &[u8]) -> Result<u16, CameraError> {
    if jpeg.len() < 4 || jpeg[0] != 0xFF || jpeg[1] != 0xD8 {
        return Err(malformed("not a JPEG"));
    }

    let mut pos = 2;
    while pos + 4 <= jpeg.len() {
        if jpeg[pos] != 0xFF {
            return Err(malformed("bad marker"));
        }
        let marker = jpeg[pos + 1];
        // Start of scan or end of image: no more metadata segments.
        if marker == 0xDA || marker == 0xD9 {
            break;
        }
        let length = usize::from(u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]));
        if length < 2 {
            return Err(malformed("segment length"));
        }
        let body = jpeg
            .get(pos + 4..pos + 2 + length)
            .ok_or_else(|| malformed("truncated segment"))?;
        if marker == 0xE1 && body.starts_with(b"Exif\0\0") {
            return orientation_from_tiff(&body[6..]);
        }
        pos += 2 + length;
    }
    Err(malformed("no EXIF segment"))
}

fn orientation_from_tiff(tiff: &[u8]) -> Result<u16, CameraError> {
    let order = match tiff.get(0..2) {
        Some(b"II") => ByteOrder::Little,
        Some(b"MM") => ByteOrder::Big,
        _ => return Err(malformed("byte order")),
    };
    if order.u16(tiff, 2) != Some(42) {
        return Err(malformed("TIFF magic"));
    }
    let ifd = order.u32(tiff, 4).ok_or_else(|| malformed("IFD offset"))? as usize;
    let count = order.u16(tiff, ifd).ok_or_else(|| malformed("IFD count"))?;

    for index in 0..usize::from(count) {
        let entry = ifd + 2 + index * 12;
        let tag = order.u16(tiff, entry).ok_or_else(|| malformed("IFD entry"))?;
        if tag != ORIENTATION_TAG {
            continue;
        }
        if order.u16(tiff, entry + 2) != Some(TYPE_SHORT) {
            return Err(malformed("orientation type"));
        }
        return order
            .u16(tiff, entry + 8)
            .ok_or_else(|| malformed("orientation value"));
    }
    Err(malformed("no orientation tag"))
}

/// Clockwise rotation for an EXIF orientation value. Mirrored variants map
/// to the rotation of their unmirrored counterpart; unknown values are 0.
pub fn orientation_to_degrees(orientation: u16) -> u32 {
    match orientation {
        3 | 4 => 180,
        5 | 6 => 90,
        7 | 8 => 270,
        _ => 0,
    }
}

/// Rotation of a captured JPEG, 0 when the metadata is missing or unreadable.
pub fn rotation_degrees(jpeg: &[u8]) -> u32 {
    match read_orientation(jpeg) {
        Ok(orientation) => orientation_to_degrees(orientation),
        Err(e) => {
            log::debug!("exif orientation unavailable: {e}");
            0
        }
    }
}

/// Build a bare JPEG header carrying only an EXIF orientation tag.
pub fn orientation_segment(orientation: u16, big_endian: bool) -> Vec<u8> {
    let order = if big_endian { ByteOrder::Big } else { ByteOrder::Little };
    let put16 = |v: u16| match order {
        ByteOrder::Little => v.to_le_bytes(),
        ByteOrder::Big => v.to_be_bytes(),
    };
    let put32 = |v: u32| match order {
        ByteOrder::Little => v.to_le_bytes(),
        ByteOrder::Big => v.to_be_bytes(),
    };

    let mut tiff = Vec::new();
    tiff.extend_from_slice(if big_endian { b"MM" } else { b"II" });
    tiff.extend_from_slice(&put16(42));
    tiff.extend_from_slice(&put32(8));
    tiff.extend_from_slice(&put16(1));
    tiff.extend_from_slice(&put16(ORIENTATION_TAG));
    tiff.extend_from_slice(&put16(TYPE_SHORT));
    tiff.extend_from_slice(&put32(1));
    tiff.extend_from_slice(&put16(orientation));
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&put32(0));

    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    let length = (2 + 6 + tiff.len()) as u16;
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_and_big_endian() {
        assert_eq!(read_orientation(&orientation_segment(6, false)).unwrap(), 6);
        assert_eq!(read_orientation(&orientation_segment(8, true)).unwrap(), 8);
    }

    #[test]
    fn test_degree_mapping() {
        let expected = [(1, 0), (2, 0), (3, 180), (4, 180), (5, 90), (6, 90), (7, 270), (8, 270), (0, 0), (9, 0)];
        for (orientation, degrees) in expected {
            assert_eq!(orientation_to_degrees(orientation), degrees, "orientation {orientation}");
        }
    }

    #[test]
    fn test_missing_or_malformed_is_zero() {
        assert_eq!(rotation_degrees(&[]), 0);
        assert_eq!(rotation_degrees(b"not a jpeg at all"), 0);
        assert_eq!(rotation_degrees(&[0xFF, 0xD8, 0xFF, 0xD9]), 0);

        let mut truncated = orientation_segment(6, false);
        truncated.truncate(20);
        assert_eq!(rotation_degrees(&truncated), 0);
    }

    #[test]
    fn test_skips_other_segments() {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0xAA, 0xBB];
        jpeg.extend_from_slice(&orientation_segment(3, true)[2..]);
        assert_eq!(rotation_degrees(&jpeg), 180);
    }
}
