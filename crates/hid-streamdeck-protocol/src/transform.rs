//! Pixel transforms from caller RGB to device wire order
//!
//! Callers always supply square, row-major, top-left origin RGB buffers.
//! Each model wants those pixels rotated or mirrored and with its own
//! channel order. A [`PixelTransform`] describes that mapping as data: for
//! every destination pixel it names the source pixel, then rewrites the
//! channels.

use serde::{Deserialize, Serialize};

use crate::{BYTES_PER_PIXEL, StreamDeckError, StreamDeckResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Arrange one pixel's channels in wire order.
    pub fn arrange(self, r: u8, g: u8, b: u8) -> [u8; 3] {
        match self {
            ChannelOrder::Rgb => [r, g, b],
            ChannelOrder::Bgr => [b, g, r],
        }
    }
}

/// Per-channel rewrite applied after source lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMask {
    Keep,
    /// Any non-zero value becomes the given constant, zero stays zero.
    NonZeroTo(u8),
}

impl ChannelMask {
    pub fn apply(self, value: u8) -> u8 {
        match self {
            ChannelMask::Keep => value,
            ChannelMask::NonZeroTo(_) if value == 0 => 0,
            ChannelMask::NonZeroTo(constant) => constant,
        }
    }
}

/// Destination-to-source mapping for a square icon.
///
/// For destination `(row, col)` the source is found by first swapping the
/// coordinates when `transpose` is set, then mirroring the source column
/// (`mirror_x`) and row (`mirror_y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelTransform {
    pub transpose: bool,
    pub mirror_x: bool,
    pub mirror_y: bool,
    pub order: ChannelOrder,
    /// Masks for the source red, green and blue channels.
    pub masks: [ChannelMask; 3],
}

impl PixelTransform {
    pub const IDENTITY: PixelTransform = PixelTransform {
        transpose: false,
        mirror_x: false,
        mirror_y: false,
        order: ChannelOrder::Rgb,
        masks: [ChannelMask::Keep; 3],
    };

    /// Source coordinate feeding destination `(row, col)` of a `size`-wide icon.
    pub fn source_of(&self, size: usize, row: usize, col: usize) -> (usize, usize) {
        let (mut src_row, mut src_col) = if self.transpose {
            (col, row)
        } else {
            (row, col)
        };
        if self.mirror_x {
            src_col = size - 1 - src_col;
        }
        if self.mirror_y {
            src_row = size - 1 - src_row;
        }
        (src_row, src_col)
    }

    /// Rewrite one source pixel's channels in wire order.
    pub fn pixel(&self, r: u8, g: u8, b: u8) -> [u8; 3] {
        let [mr, mg, mb] = self.masks;
        self.order.arrange(mr.apply(r), mg.apply(g), mb.apply(b))
    }

    /// Apply the transform to a `size` x `size` RGB buffer.
    pub fn apply(&self, size: usize, rgb: &[u8]) -> StreamDeckResult<Vec<u8>> {
        let expected = size * size * BYTES_PER_PIXEL;
        if rgb.len() != expected {
            return Err(StreamDeckError::InvalidImageLength {
                expected,
                actual: rgb.len(),
            });
        }

        let mut out = Vec::with_capacity(expected);
        for row in 0..size {
            for col in 0..size {
                let (src_row, src_col) = self.source_of(size, row, col);
                let start = (src_row * size + src_col) * BYTES_PER_PIXEL;
                let [r, g, b] = match rgb.get(start..start + BYTES_PER_PIXEL) {
                    Some(&[r, g, b]) => [r, g, b],
                    _ => {
                        return Err(StreamDeckError::InvalidImageLength {
                            expected,
                            actual: rgb.len(),
                        });
                    }
                };
                out.extend_from_slice(&self.pixel(r, g, b));
            }
        }
        Ok(out)
    }
}
