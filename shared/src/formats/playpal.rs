//! PLAYPAL palette lump and RGB565 conversion.
//!
//! The lump is a sequence of palettes, each [`PALETTE_BYTES`] long: 256 RGB
//! triples of 8 bits per channel.

use crate::constants::PALETTE_ENTRIES;

/// Bytes in one palette (256 RGB triples).
pub const PALETTE_BYTES: usize = PALETTE_ENTRIES * 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaletteError {
    #[error("palette {index} out of range ({count} palettes in lump)")]
    OutOfRange { index: usize, count: usize },
}

/// Pack an 8-bit-per-channel color into RGB565.
#[inline]
pub const fn rgb_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Borrowed view of a PLAYPAL lump.
#[derive(Debug, Clone, Copy)]
pub struct PlayPal<'a> {
    data: &'a [u8],
}

impl<'a> PlayPal<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Number of complete palettes in the lump.
    pub fn count(&self) -> usize {
        self.data.len() / PALETTE_BYTES
    }

    /// Raw RGB triples of palette `index`.
    pub fn palette(&self, index: usize) -> Result<&'a [u8], PaletteError> {
        if index >= self.count() {
            return Err(PaletteError::OutOfRange {
                index,
                count: self.count(),
            });
        }
        let start = index * PALETTE_BYTES;
        Ok(&self.data[start..start + PALETTE_BYTES])
    }

    /// Palette `index` converted to RGB565, one entry per color index.
    pub fn rgb565(&self, index: usize) -> Result<[u16; PALETTE_ENTRIES], PaletteError> {
        let rgb = self.palette(index)?;
        let mut table = [0u16; PALETTE_ENTRIES];
        for (entry, triple) in table.iter_mut().zip(rgb.chunks_exact(3)) {
            *entry = rgb_to_rgb565(triple[0], triple[1], triple[2]);
        }
        Ok(table)
    }
}
