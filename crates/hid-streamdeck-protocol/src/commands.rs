//! Feature reports and caller-value validation

use crate::{BYTES_PER_PIXEL, StreamDeckError, StreamDeckResult};

/// Length of the brightness feature report.
pub const BRIGHTNESS_REPORT_LEN: usize = 17;

const BRIGHTNESS_PREFIX: [u8; 5] = [0x05, 0x55, 0xaa, 0xd1, 0x01];

/// Build the brightness feature report for `percentage` (0 - 100).
pub fn brightness_report(percentage: u8) -> StreamDeckResult<[u8; BRIGHTNESS_REPORT_LEN]> {
    if percentage > 100 {
        return Err(StreamDeckError::InvalidBrightness(percentage));
    }
    let mut report = [0u8; BRIGHTNESS_REPORT_LEN];
    let (prefix, rest) = report.split_at_mut(BRIGHTNESS_PREFIX.len());
    prefix.copy_from_slice(&BRIGHTNESS_PREFIX);
    if let Some(slot) = rest.first_mut() {
        *slot = percentage;
    }
    Ok(report)
}

/// Accept a color channel only if it is exactly representable in one byte.
pub fn check_rgb_value(value: i32) -> StreamDeckResult<u8> {
    u8::try_from(value).map_err(|_out_of_range| StreamDeckError::InvalidColorValue(value))
}

/// Split a packed `0xRRGGBB` color into channels. Bits above 24 are ignored.
pub fn unpack_rgb(packed: u32) -> (u8, u8, u8) {
    let [_, r, g, b] = packed.to_be_bytes();
    (r, g, b)
}

/// Center a `inner` x `inner` RGB image on a black `outer` x `outer` icon.
///
/// The mini renders its artwork at 72 px inside an 80 px icon so the outer
/// edge is not clipped by the key bezel.
pub fn letterbox(inner: usize, outer: usize, rgb: &[u8]) -> StreamDeckResult<Vec<u8>> {
    if inner > outer {
        return Err(StreamDeckError::InvalidInsetSize { inner, outer });
    }
    let expected = inner * inner * BYTES_PER_PIXEL;
    if rgb.len() != expected {
        return Err(StreamDeckError::InvalidImageLength {
            expected,
            actual: rgb.len(),
        });
    }

    let border = (outer - inner) / 2;
    let inner_row = inner * BYTES_PER_PIXEL;
    let outer_row = outer * BYTES_PER_PIXEL;
    let mut out = vec![0u8; outer * outer_row];
    for (y, src) in rgb.chunks_exact(inner_row).enumerate() {
        let start = (y + border) * outer_row + border * BYTES_PER_PIXEL;
        if let Some(dst) = out.get_mut(start..start + inner_row) {
            dst.copy_from_slice(src);
        }
    }
    Ok(out)
}
