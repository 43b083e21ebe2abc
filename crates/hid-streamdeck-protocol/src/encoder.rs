//! Image and color encoding for one key
//!
//! Every entry point validates its inputs before producing any bytes, so a
//! rejected call never yields partial output.

use crate::commands::{check_rgb_value, letterbox, unpack_rgb};
use crate::pages::PageDispatch;
use crate::{BYTES_PER_PIXEL, DeckModel, StreamDeckError, StreamDeckResult};

/// The pages of one key image, in send order, plus how to send them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub key_index: usize,
    pub pages: Vec<Vec<u8>>,
    pub dispatch: PageDispatch,
}

impl EncodedImage {
    pub fn total_len(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

impl DeckModel {
    /// Encode a caller RGB icon (`icon_size` square, row-major) for `key_index`.
    pub fn encode_image(self, key_index: usize, rgb: &[u8]) -> StreamDeckResult<EncodedImage> {
        self.check_valid_key_index(key_index)?;
        let spec = self.spec();
        let expected = spec.icon_bytes();
        if rgb.len() != expected {
            return Err(StreamDeckError::InvalidImageLength {
                expected,
                actual: rgb.len(),
            });
        }
        let pixels = spec.transform.apply(spec.icon_size, rgb)?;
        self.encode_pixels(key_index, &pixels)
    }

    /// Center a smaller `inner` px RGB image on a black icon of this model's
    /// size. The result can be passed to [`DeckModel::encode_image`].
    pub fn letterbox(self, inner: usize, rgb: &[u8]) -> StreamDeckResult<Vec<u8>> {
        letterbox(inner, self.icon_size(), rgb)
    }

    /// Encode a solid color. Channels are checked to be in 0 - 255.
    ///
    /// The color skips the pixel transform: no mirroring and no channel
    /// masks, only the model's channel order.
    pub fn encode_color(self, key_index: usize, r: i32, g: i32, b: i32) -> StreamDeckResult<EncodedImage> {
        self.check_valid_key_index(key_index)?;
        let r = check_rgb_value(r)?;
        let g = check_rgb_value(g)?;
        let b = check_rgb_value(b)?;
        self.encode_solid(key_index, r, g, b)
    }

    /// Encode a solid color given as `0xRRGGBB`.
    pub fn encode_color_packed(self, key_index: usize, rgb: u32) -> StreamDeckResult<EncodedImage> {
        self.check_valid_key_index(key_index)?;
        let (r, g, b) = unpack_rgb(rgb);
        self.encode_solid(key_index, r, g, b)
    }

    fn encode_solid(self, key_index: usize, r: u8, g: u8, b: u8) -> StreamDeckResult<EncodedImage> {
        let spec = self.spec();
        let pixel = spec.transform.order.arrange(r, g, b);
        let pixels = pixel.repeat(spec.icon_size * spec.icon_size);
        self.encode_pixels(key_index, &pixels)
    }

    /// Page already-transformed pixel bytes.
    pub fn encode_pixels(self, key_index: usize, pixels: &[u8]) -> StreamDeckResult<EncodedImage> {
        self.check_valid_key_index(key_index)?;
        let spec = self.spec();
        let expected = spec.icon_bytes();
        if pixels.len() != expected {
            return Err(StreamDeckError::UnexpectedPixelCount {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(EncodedImage {
            key_index,
            pages: spec.pages.split(key_index, pixels)?,
            dispatch: spec.pages.dispatch,
        })
    }

    /// Cut a full-panel RGB image into per-key icons.
    ///
    /// The panel is `columns * icon_size` wide and `rows * icon_size` tall,
    /// row-major. Tiles are returned in grid order, each paired with the key
    /// the layout puts at that position.
    pub fn split_panel(self, rgb: &[u8]) -> StreamDeckResult<Vec<(usize, Vec<u8>)>> {
        let spec = self.spec();
        let expected = spec.panel_bytes();
        if rgb.len() != expected {
            return Err(StreamDeckError::InvalidPanelLength {
                expected,
                actual: rgb.len(),
            });
        }

        let (panel_width, _) = spec.panel_size();
        let panel_row = panel_width * BYTES_PER_PIXEL;
        let tile_row = spec.icon_size * BYTES_PER_PIXEL;

        let mut tiles = Vec::with_capacity(spec.key_count());
        for (y, keys) in spec.layout.iter().enumerate() {
            for (x, &key) in keys.iter().enumerate() {
                let mut tile = Vec::with_capacity(spec.icon_bytes());
                for line in 0..spec.icon_size {
                    let start = (y * spec.icon_size + line) * panel_row + x * tile_row;
                    let src = rgb.get(start..start + tile_row).ok_or(
                        StreamDeckError::InvalidPanelLength {
                            expected,
                            actual: rgb.len(),
                        },
                    )?;
                    tile.extend_from_slice(src);
                }
                tiles.push((key, tile));
            }
        }
        Ok(tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_original_image_pages() -> StreamDeckResult<()> {
        let encoded = DeckModel::Original.encode_image(0, &vec![0u8; 15552])?;
        assert_eq!(encoded.dispatch, PageDispatch::Independent);
        assert_eq!(encoded.pages.len(), 2);
        assert!(encoded.pages.iter().all(|p| p.len() == 8191));
        assert_eq!(&encoded.pages[0][..6], &[0x02, 0x01, 0x01, 0x00, 0x00, 0x01]);
        assert_eq!(&encoded.pages[1][..6], &[0x02, 0x01, 0x02, 0x00, 0x01, 0x01]);
        Ok(())
    }

    #[test]
    fn test_mini_image_pages() -> StreamDeckResult<()> {
        let encoded = DeckModel::Mini.encode_image(5, &vec![0u8; 19200])?;
        assert_eq!(encoded.dispatch, PageDispatch::Batched);
        assert_eq!(encoded.pages.len(), 20);
        for (i, page) in encoded.pages.iter().enumerate() {
            assert_eq!(page.len(), 1024);
            assert_eq!(page[2], i as u8);
            assert_eq!(page[4], u8::from(i == 19));
            assert_eq!(page[5], 6);
        }
        Ok(())
    }

    #[test]
    fn test_validation_order() {
        // Key index is checked before the buffer.
        assert!(matches!(
            DeckModel::Mini.encode_image(6, &[]),
            Err(StreamDeckError::InvalidKeyIndex { index: 6, max: 5 })
        ));
        assert!(matches!(
            DeckModel::Mini.encode_image(0, &[0; 3]),
            Err(StreamDeckError::InvalidImageLength {
                expected: 19200,
                actual: 3
            })
        ));
        assert!(matches!(
            DeckModel::Original.encode_color(15, 0, 0, 0),
            Err(StreamDeckError::InvalidKeyIndex { .. })
        ));
        assert!(matches!(
            DeckModel::Original.encode_color(0, 0, 300, 0),
            Err(StreamDeckError::InvalidColorValue(300))
        ));
    }

    #[test]
    fn test_solid_color_skips_masks() -> StreamDeckResult<()> {
        let encoded = DeckModel::Original.encode_color(3, 0x12, 0x34, 0x56)?;
        let first = &encoded.pages[0];
        assert_eq!(&first[70..76], &[0x56, 0x34, 0x12, 0x56, 0x34, 0x12]);
        Ok(())
    }

    #[test]
    fn test_packed_matches_channels() -> StreamDeckResult<()> {
        assert_eq!(
            DeckModel::Mini.encode_color_packed(2, 0xff8000)?,
            DeckModel::Mini.encode_color(2, 0xff, 0x80, 0x00)?
        );
        Ok(())
    }

    #[test]
    fn test_letterboxed_mini_icon_encodes() -> StreamDeckResult<()> {
        let icon = DeckModel::Mini.letterbox(72, &vec![0x40u8; 72 * 72 * 3])?;
        assert_eq!(icon.len(), 19200);
        let encoded = DeckModel::Mini.encode_image(0, &icon)?;
        assert_eq!(encoded.pages.len(), 20);

        assert!(matches!(
            DeckModel::Original.letterbox(80, &vec![0u8; 80 * 80 * 3]),
            Err(StreamDeckError::InvalidInsetSize { inner: 80, outer: 72 })
        ));
        Ok(())
    }

    #[test]
    fn test_split_panel_uses_layout() -> StreamDeckResult<()> {
        let model = DeckModel::Original;
        let spec = model.spec();
        let (width, height) = spec.panel_size();
        // Color every pixel by its tile column so tiles are distinguishable.
        let mut panel = Vec::with_capacity(spec.panel_bytes());
        for _y in 0..height {
            for x in 0..width {
                let col = (x / spec.icon_size) as u8;
                panel.extend_from_slice(&[col, 0, 0]);
            }
        }

        let tiles = model.split_panel(&panel)?;
        assert_eq!(tiles.len(), 15);
        let (key, tile) = &tiles[0];
        assert_eq!(*key, 4);
        assert!(tile.chunks_exact(3).all(|px| px[0] == 0));
        let (key, tile) = &tiles[4];
        assert_eq!(*key, 0);
        assert!(tile.chunks_exact(3).all(|px| px[0] == 4));

        assert!(matches!(
            model.split_panel(&panel[1..]),
            Err(StreamDeckError::InvalidPanelLength { .. })
        ));
        Ok(())
    }
}
