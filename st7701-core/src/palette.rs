//! The 256-entry hardware palette for indexed-colour scanout.
//!
//! Each entry is stored pre-encoded in the panel's native bit order so the
//! palette DMA channel can fetch it straight into the pixel pump; the final
//! bit reversal onto the 18 data pins is done by the PIO program. Red sits
//! in bits 31..27 with its low source bit replicated at bit 14, green in
//! bits 26..21, blue in bits 20..15.

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::RgbColor;

pub const PALETTE_ENTRIES: usize = 256;

/// Encode an RGB888 colour packed as `0x00RRGGBB`.
pub fn encode_rgb888(colour: u32) -> u32 {
    ((colour << 8) & 0xF800_0000)
        | ((colour << 11) & 0x07E0_0000)
        | ((colour << 13) & 0x001F_8000)
        | ((colour >> 4) & 0x0000_4000)
}

/// Encode separate RGB888 channels.
pub fn encode_rgb(r: u8, g: u8, b: u8) -> u32 {
    (((r as u32) << 24) & 0xF800_0000)
        | (((g as u32) << 19) & 0x07E0_0000)
        | (((b as u32) << 13) & 0x001F_8000)
        | (((r as u32) << 12) & 0x0000_4000)
}

/// Palette RAM read continuously by the DMA chain while scanning out.
///
/// The palette lookup state machine rebuilds entry addresses from
/// `base >> 10`, so the table must live on a 1 KiB boundary; the repr
/// guarantees it. Entries are atomics so the producer can retune colours
/// while the table stays mapped for hardware (callers serialise against
/// scanout with a vsync wait).
#[repr(C, align(1024))]
pub struct Palette {
    entries: [AtomicU32; PALETTE_ENTRIES],
}

impl Palette {
    pub const fn new() -> Self {
        Self {
            entries: [const { AtomicU32::new(0) }; PALETTE_ENTRIES],
        }
    }

    pub fn set(&self, entry: u8, colour: Rgb888) {
        self.entries[entry as usize].store(
            encode_rgb(colour.r(), colour.g(), colour.b()),
            Ordering::Relaxed,
        );
    }

    pub fn get(&self, entry: u8) -> u32 {
        self.entries[entry as usize].load(Ordering::Relaxed)
    }

    pub fn as_ptr(&self) -> *const u32 {
        self.entries.as_ptr() as *const u32
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_1k_aligned() {
        assert_eq!(core::mem::align_of::<Palette>(), 1024);
        assert_eq!(core::mem::size_of::<Palette>(), 1024);
    }

    #[test]
    fn pure_red_sets_top_bits_and_replica() {
        // Top 5 bits plus the replicated low red bit at bit 14.
        assert_eq!(encode_rgb(255, 0, 0), 0xF800_4000);
    }

    #[test]
    fn pure_green_and_blue_fields() {
        assert_eq!(encode_rgb(0, 255, 0), 0x07E0_0000);
        assert_eq!(encode_rgb(0, 0, 255), 0x001F_8000);
    }

    #[test]
    fn white_fills_all_colour_fields() {
        assert_eq!(encode_rgb(255, 255, 255), 0xFFFF_C000);
    }

    #[test]
    fn packed_and_channel_encoders_agree() {
        for &(r, g, b) in &[
            (255u8, 0u8, 0u8),
            (0, 255, 0),
            (0, 0, 255),
            (0x12, 0x34, 0x56),
            (0xAB, 0xCD, 0xEF),
        ] {
            let packed = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
            assert_eq!(encode_rgb888(packed), encode_rgb(r, g, b));
        }
    }

    #[test]
    fn channel_fields_round_trip() {
        let word = encode_rgb(0b1010_1100, 0b0110_0110, 0b1111_0000);
        assert_eq!(word >> 27, 0b10101); // r >> 3
        assert_eq!((word >> 21) & 0x3F, 0b011001); // g >> 2
        assert_eq!((word >> 15) & 0x3F, 0b111100); // b >> 2
        assert_eq!((word >> 14) & 1, 0b1010_1100 >> 2 & 1); // low red bit
    }

    #[test]
    fn set_then_get() {
        let palette = Palette::new();
        palette.set(7, Rgb888::new(255, 255, 255));
        assert_eq!(palette.get(7), 0xFFFF_C000);
        assert_eq!(palette.get(8), 0);
    }
}
