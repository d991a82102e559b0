//! Shared 256-entry RGB565 lookup table.
//!
//! Written by the game thread, read by the display task while it expands
//! frames. Entries are individually atomic; a palette change that lands in the
//! middle of a frame shows up from that point of the frame on.

use std::sync::atomic::{AtomicU16, Ordering};

use espdoom_shared::constants::PALETTE_ENTRIES;

pub struct Palette {
    entries: [AtomicU16; PALETTE_ENTRIES],
}

impl Palette {
    /// All entries black.
    pub fn new() -> Self {
        Self {
            entries: std::array::from_fn(|_| AtomicU16::new(0)),
        }
    }

    #[inline]
    pub fn get(&self, index: u8) -> u16 {
        self.entries[index as usize].load(Ordering::Relaxed)
    }

    pub fn set(&self, index: u8, color: u16) {
        self.entries[index as usize].store(color, Ordering::Relaxed);
    }

    /// Replace every entry.
    pub fn load(&self, table: &[u16; PALETTE_ENTRIES]) {
        for (entry, &color) in self.entries.iter().zip(table) {
            entry.store(color, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> [u16; PALETTE_ENTRIES] {
        std::array::from_fn(|i| self.entries[i].load(Ordering::Relaxed))
    }

    /// Expand indexed pixels into big-endian RGB565 words (two bytes each).
    ///
    /// Returns the number of bytes written.
    #[inline]
    pub fn expand(&self, pixels: &[u8], out: &mut [u8]) -> usize {
        let mut written = 0;
        for (&index, word) in pixels.iter().zip(out.chunks_exact_mut(2)) {
            word.copy_from_slice(&self.get(index).to_be_bytes());
            written += 2;
        }
        written
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette")
            .field("entry0", &self.get(0))
            .field("entry255", &self.get(255))
            .finish_non_exhaustive()
    }
}
