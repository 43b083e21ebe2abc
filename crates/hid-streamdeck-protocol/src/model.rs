//! Per-model descriptors
//!
//! Everything that differs between Stream Deck models is captured as data in
//! a [`ModelSpec`]; the encoder is shared.

use serde::{Deserialize, Serialize};

use crate::pages::{PageDispatch, PageScheme, PageTemplate};
use crate::transform::{ChannelMask, ChannelOrder, PixelTransform};
use crate::{
    BYTES_PER_PIXEL, PRODUCT_ID_STREAM_DECK, PRODUCT_ID_STREAM_DECK_MINI, StreamDeckError,
    StreamDeckResult, VENDOR_ID_ELGATO,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeckModel {
    Original,
    Mini,
}

#[derive(Debug)]
pub struct ModelSpec {
    pub name: &'static str,
    pub product_id: u16,
    /// Icon edge length in pixels; icons are square.
    pub icon_size: usize,
    pub columns: usize,
    pub rows: usize,
    /// `layout[row][col]` is the key index at that grid position.
    pub layout: &'static [&'static [usize]],
    pub transform: PixelTransform,
    pub pages: PageScheme,
}

impl ModelSpec {
    pub fn key_count(&self) -> usize {
        self.columns * self.rows
    }

    /// Bytes in one caller-supplied icon buffer.
    pub fn icon_bytes(&self) -> usize {
        self.icon_size * self.icon_size * BYTES_PER_PIXEL
    }

    /// Panel dimensions in pixels: `(width, height)`.
    pub fn panel_size(&self) -> (usize, usize) {
        (self.columns * self.icon_size, self.rows * self.icon_size)
    }

    pub fn panel_bytes(&self) -> usize {
        let (width, height) = self.panel_size();
        width * height * BYTES_PER_PIXEL
    }
}

const ORIGINAL_FIRST_PAGE: [u8; 70] = [
    0x02, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x42, 0x4d, 0xf6, 0x3c, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x36, 0x00, 0x00, 0x00, 0x28, 0x00, //
    0x00, 0x00, 0x48, 0x00, 0x00, 0x00, 0x48, 0x00, //
    0x00, 0x00, 0x01, 0x00, 0x18, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0xc0, 0x3c, 0x00, 0x00, 0xc4, 0x0e, //
    0x00, 0x00, 0xc4, 0x0e, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const ORIGINAL_SECOND_PAGE: [u8; 16] = [
    0x02, 0x01, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Pixel bytes carried by the first page of an original-model image.
pub const ORIGINAL_FIRST_PAGE_PAYLOAD: usize = 7749;

static ORIGINAL_PAGES: [PageTemplate; 2] = [
    PageTemplate {
        header: &ORIGINAL_FIRST_PAGE,
        payload_len: Some(ORIGINAL_FIRST_PAGE_PAYLOAD),
    },
    PageTemplate {
        header: &ORIGINAL_SECOND_PAGE,
        payload_len: None,
    },
];

const MINI_FIRST_PAGE: [u8; 61] = [
    0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x42, 0x4d, 0x36, 0x4b, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x36, 0x00, 0x00, 0x00, 0x28, 0x00, //
    0x00, 0x00, 0x50, 0x00, 0x00, 0x00, 0x50, 0x00, //
    0x00, 0x00, 0x01, 0x00, 0x18, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x4b, 0x00, 0x00, 0xc4, 0x0e, //
    0x00, 0x00, 0xc4, 0x0e, 0x00,
];

const MINI_CONTINUATION_PAGE: [u8; 16] = [
    0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Pixel bytes carried by the first page of a mini image.
pub const MINI_FIRST_PAGE_PAYLOAD: usize = 0x3c3;

static MINI_PAGES: [PageTemplate; 1] = [PageTemplate {
    header: &MINI_FIRST_PAGE,
    payload_len: Some(MINI_FIRST_PAGE_PAYLOAD),
}];

static ORIGINAL: ModelSpec = ModelSpec {
    name: "Stream Deck",
    product_id: PRODUCT_ID_STREAM_DECK,
    icon_size: 72,
    columns: 5,
    rows: 3,
    layout: &[&[4, 3, 2, 1, 0], &[9, 8, 7, 6, 5], &[14, 13, 12, 11, 10]],
    transform: PixelTransform {
        transpose: false,
        mirror_x: true,
        mirror_y: false,
        order: ChannelOrder::Bgr,
        masks: [
            ChannelMask::NonZeroTo(0x80),
            ChannelMask::Keep,
            ChannelMask::NonZeroTo(0x20),
        ],
    },
    pages: PageScheme {
        packet_size: 8191,
        leading: &ORIGINAL_PAGES,
        continuation: None,
        page_index_offset: 2,
        first_page_index: 1,
        final_flag_offset: 4,
        key_offset: 5,
        dispatch: PageDispatch::Independent,
    },
};

static MINI: ModelSpec = ModelSpec {
    name: "Stream Deck Mini",
    product_id: PRODUCT_ID_STREAM_DECK_MINI,
    icon_size: 80,
    columns: 3,
    rows: 2,
    layout: &[&[0, 1, 2], &[3, 4, 5]],
    transform: PixelTransform {
        transpose: true,
        mirror_x: true,
        mirror_y: false,
        order: ChannelOrder::Bgr,
        masks: [ChannelMask::Keep; 3],
    },
    pages: PageScheme {
        packet_size: 1024,
        leading: &MINI_PAGES,
        continuation: Some(PageTemplate {
            header: &MINI_CONTINUATION_PAGE,
            payload_len: None,
        }),
        page_index_offset: 2,
        first_page_index: 0,
        final_flag_offset: 4,
        key_offset: 5,
        dispatch: PageDispatch::Batched,
    },
};

impl DeckModel {
    pub const ALL: [DeckModel; 2] = [DeckModel::Original, DeckModel::Mini];

    pub fn spec(self) -> &'static ModelSpec {
        match self {
            DeckModel::Original => &ORIGINAL,
            DeckModel::Mini => &MINI,
        }
    }

    pub fn from_product_id(product_id: u16) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.spec().product_id == product_id)
    }

    pub fn from_ids(vendor_id: u16, product_id: u16) -> Option<Self> {
        if vendor_id != VENDOR_ID_ELGATO {
            return None;
        }
        Self::from_product_id(product_id)
    }

    pub fn product_id(self) -> u16 {
        self.spec().product_id
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn icon_size(self) -> usize {
        self.spec().icon_size
    }

    pub fn columns(self) -> usize {
        self.spec().columns
    }

    pub fn rows(self) -> usize {
        self.spec().rows
    }

    pub fn key_count(self) -> usize {
        self.spec().key_count()
    }

    pub fn check_valid_key_index(self, key_index: usize) -> StreamDeckResult<()> {
        let key_count = self.key_count();
        if key_index >= key_count {
            return Err(StreamDeckError::InvalidKeyIndex {
                index: key_index,
                max: key_count.saturating_sub(1),
            });
        }
        Ok(())
    }

    /// Key index at grid column `x`, row `y`.
    pub fn button_index_from_position(self, x: usize, y: usize) -> StreamDeckResult<usize> {
        self.spec()
            .layout
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .ok_or(StreamDeckError::InvalidPosition { x, y })
    }
}

impl std::fmt::Display for DeckModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
