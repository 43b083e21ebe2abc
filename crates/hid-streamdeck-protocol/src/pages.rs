//! Image page layout
//!
//! An encoded key image is too large for one output report, so it is split
//! across fixed-size pages. Every page starts with a header; the first pages
//! use model-specific templates and later pages repeat a continuation
//! template. The splitter patches three header bytes per page: the page
//! index, the final-page flag, and the 1-based key number.

use serde::Serialize;

use crate::{StreamDeckError, StreamDeckResult};

/// How the pages of one image are handed to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageDispatch {
    /// One write per page, byte counts summed.
    Independent,
    /// All pages in one ordered multi-write.
    Batched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTemplate {
    pub header: &'static [u8],
    /// Payload bytes carried by this page; `None` fills the page.
    pub payload_len: Option<usize>,
}

impl PageTemplate {
    fn capacity(&self, packet_size: usize) -> usize {
        let room = packet_size.saturating_sub(self.header.len());
        self.payload_len.map_or(room, |len| len.min(room))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageScheme {
    /// Size of every page; unused payload bytes are zero.
    pub packet_size: usize,
    /// Templates for the first pages, in order.
    pub leading: &'static [PageTemplate],
    /// Template repeated once `leading` is exhausted.
    pub continuation: Option<PageTemplate>,
    pub page_index_offset: usize,
    /// Value written at `page_index_offset` on the first page.
    pub first_page_index: u8,
    pub final_flag_offset: usize,
    pub key_offset: usize,
    pub dispatch: PageDispatch,
}

impl PageScheme {
    fn template(&self, ordinal: usize) -> Option<&PageTemplate> {
        self.leading
            .get(ordinal)
            .or_else(|| self.continuation.as_ref())
    }

    /// Total payload capacity, or `None` when the continuation repeats
    /// without bound.
    pub fn capacity(&self) -> Option<usize> {
        match self.continuation {
            Some(_) => None,
            None => Some(
                self.leading
                    .iter()
                    .map(|t| t.capacity(self.packet_size))
                    .sum(),
            ),
        }
    }

    /// Split already-transformed pixel bytes into pages for `key_index`.
    pub fn split(&self, key_index: usize, pixels: &[u8]) -> StreamDeckResult<Vec<Vec<u8>>> {
        let key_byte = u8::try_from(key_index + 1).map_err(|_overflow| StreamDeckError::InvalidKeyIndex {
            index: key_index,
            max: usize::from(u8::MAX) - 1,
        })?;
        let overflow = || StreamDeckError::UnexpectedPixelCount {
            expected: self.capacity().unwrap_or(pixels.len()),
            actual: pixels.len(),
        };

        // Leading templates always go out, even when the image runs short.
        let min_pages = self.leading.len().max(1);
        let mut pages = Vec::new();
        let mut offset = 0;
        while offset < pixels.len() || pages.len() < min_pages {
            let ordinal = pages.len();
            let template = self.template(ordinal).ok_or_else(overflow)?;
            let take = template
                .capacity(self.packet_size)
                .min(pixels.len() - offset);
            if take == 0 && offset < pixels.len() {
                return Err(overflow());
            }
            let page_index = u8::try_from(ordinal)
                .ok()
                .and_then(|o| o.checked_add(self.first_page_index))
                .ok_or_else(overflow)?;

            let mut page = vec![0u8; self.packet_size];
            let header_end = template.header.len();
            let body = page.get_mut(..header_end + take).ok_or_else(overflow)?;
            let (header, payload) = body.split_at_mut(header_end);
            header.copy_from_slice(template.header);
            payload.copy_from_slice(pixels.get(offset..offset + take).ok_or_else(overflow)?);

            self.patch(&mut page, self.page_index_offset, page_index)?;
            self.patch(&mut page, self.key_offset, key_byte)?;
            self.patch(&mut page, self.final_flag_offset, 0)?;
            offset += take;
            pages.push(page);
        }

        if let Some(last) = pages.last_mut() {
            self.patch(last, self.final_flag_offset, 1)?;
        }
        Ok(pages)
    }

    fn patch(&self, page: &mut [u8], offset: usize, value: u8) -> StreamDeckResult<()> {
        let actual = page.len();
        let slot = page
            .get_mut(offset)
            .ok_or(StreamDeckError::UnexpectedPixelCount {
                expected: offset + 1,
                actual,
            })?;
        *slot = value;
        Ok(())
    }
}
