//! USB vendor and product identifiers

/// Elgato Systems.
pub const VENDOR_ID_ELGATO: u16 = 0x0fd9;

/// Original 15-key Stream Deck.
pub const PRODUCT_ID_STREAM_DECK: u16 = 0x0060;

/// 6-key Stream Deck Mini.
pub const PRODUCT_ID_STREAM_DECK_MINI: u16 = 0x0063;

