//! HID protocol implementation for Elgato Stream Deck panels
//!
//! Everything in this crate is pure: it turns caller intents (an image for a
//! key, a solid color, a brightness percentage) into the exact output and
//! feature reports a given model expects, and turns input reports back into
//! key transitions. Nothing here touches a device.
//!
//! ## Supported models
//! - Original Stream Deck (15 keys, 72 px icons, two-page image upload)
//! - Stream Deck Mini (6 keys, 80 px icons, twenty-page image upload)

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod commands;
pub mod encoder;
pub mod ids;
pub mod input;
pub mod model;
pub mod pages;
pub mod transform;
pub mod types;

pub use commands::*;
pub use encoder::*;
pub use ids::*;
pub use input::*;
pub use model::*;
pub use pages::{PageDispatch, PageScheme, PageTemplate};
pub use transform::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamDeckError {
    #[error("Expected a valid key index 0 - {max}, got {index}")]
    InvalidKeyIndex { index: usize, max: usize },

    #[error("Expected a valid color RGB value 0 - 255, got {0}")]
    InvalidColorValue(i32),

    #[error("Expected image buffer of length {expected}, got length {actual}")]
    InvalidImageLength { expected: usize, actual: usize },

    #[error("Expected brightness percentage 0 - 100, got {0}")]
    InvalidBrightness(u8),

    #[error("Expected panel buffer of length {expected}, got length {actual}")]
    InvalidPanelLength { expected: usize, actual: usize },

    #[error("No key at position ({x}, {y})")]
    InvalidPosition { x: usize, y: usize },

    #[error("Pixel buffer of {actual} bytes does not fit the page layout (expected {expected})")]
    UnexpectedPixelCount { expected: usize, actual: usize },

    #[error("Cannot letterbox a {inner}px image into a {outer}px icon")]
    InvalidInsetSize { inner: usize, outer: usize },
}

pub type StreamDeckResult<T> = Result<T, StreamDeckError>;

/// Every key index fits in the 32-bit pressed-key mask.
pub const MAX_KEYS: usize = 32;

/// Bytes per pixel in every image buffer this crate accepts or emits.
pub const BYTES_PER_PIXEL: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StreamDeckError::InvalidKeyIndex {
            index: 15,
            max: 14,
        };
        assert_eq!(err.to_string(), "Expected a valid key index 0 - 14, got 15");

        let err = StreamDeckError::InvalidColorValue(256);
        assert_eq!(
            err.to_string(),
            "Expected a valid color RGB value 0 - 255, got 256"
        );

        let err = StreamDeckError::InvalidImageLength {
            expected: 15552,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Expected image buffer of length 15552, got length 3"
        );
    }

    #[test]
    fn test_constants() {
        assert_eq!(BYTES_PER_PIXEL, 3);
        assert_eq!(MAX_KEYS, 32);
    }
}
