//! DMX digitized sound effect record.
//!
//! # Layout
//! ```text
//! 0x00: format       u16 LE (must be 3)
//! 0x02: sample_rate  u16 LE
//! 0x04: sample_count u32 LE
//! 0x08: reserved     16 bytes
//! 0x18: unsigned 8-bit PCM samples
//! ```
//!
//! The declared sample count covers the reserved padding as well, so it is
//! usually larger than the payload that follows the header. The usable sample
//! count is clamped to the payload.

use std::ops::Deref;
use std::sync::Arc;

/// The only format tag accepted by the mixer.
pub const DMX_FORMAT_PCM: u16 = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DmxFormatError {
    #[error("sound record truncated: {len} bytes, header needs {size}", size = DmxHeader::SIZE)]
    Truncated { len: usize },

    #[error("unknown sound format {0}")]
    UnsupportedFormat(u16),
}

/// DMX header (24 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct DmxHeader {
    pub format: u16,
    pub sample_rate: u16,
    pub sample_count: u32,
    pub _reserved: [u8; 16],
}

impl DmxHeader {
    pub const SIZE: usize = 24;

    pub fn new(sample_rate: u16, sample_count: u32) -> Self {
        Self {
            format: DMX_FORMAT_PCM,
            sample_rate,
            sample_count,
            _reserved: [0; 16],
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.format.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.sample_rate.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.sample_count.to_le_bytes());
        bytes[8..].copy_from_slice(&self._reserved);
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let mut reserved = [0u8; 16];
        reserved.copy_from_slice(&bytes[8..Self::SIZE]);
        Some(Self {
            format: u16::from_le_bytes([bytes[0], bytes[1]]),
            sample_rate: u16::from_le_bytes([bytes[2], bytes[3]]),
            sample_count: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            _reserved: reserved,
        })
    }
}

/// A window of 8-bit PCM inside a shared lump.
///
/// Cloning only bumps the reference count of the underlying lump, which stays
/// owned by the resource cache.
#[derive(Clone)]
pub struct PcmBuffer {
    lump: Arc<[u8]>,
    start: usize,
    len: usize,
}

impl PcmBuffer {
    /// Use a whole buffer as PCM.
    pub fn new(data: Arc<[u8]>) -> Self {
        let len = data.len();
        Self {
            lump: data,
            start: 0,
            len,
        }
    }

    /// Use `len` bytes starting at `start`, clamped to the buffer.
    pub fn window(data: Arc<[u8]>, start: usize, len: usize) -> Self {
        let start = start.min(data.len());
        let len = len.min(data.len() - start);
        Self {
            lump: data,
            start,
            len,
        }
    }
}

impl Deref for PcmBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.lump[self.start..self.start + self.len]
    }
}

impl std::fmt::Debug for PcmBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmBuffer")
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

/// A parsed DMX sound effect.
#[derive(Debug, Clone)]
pub struct DmxSound {
    pub header: DmxHeader,
    pub samples: PcmBuffer,
}

impl DmxSound {
    /// Parse a sound lump. Rejects any format tag other than [`DMX_FORMAT_PCM`].
    pub fn parse(lump: Arc<[u8]>) -> Result<Self, DmxFormatError> {
        let header =
            DmxHeader::from_bytes(&lump).ok_or(DmxFormatError::Truncated { len: lump.len() })?;
        if header.format != DMX_FORMAT_PCM {
            return Err(DmxFormatError::UnsupportedFormat(header.format));
        }
        let samples = PcmBuffer::window(lump, DmxHeader::SIZE, header.sample_count as usize);
        Ok(Self { header, samples })
    }

    pub fn sample_rate(&self) -> u32 {
        self.header.sample_rate as u32
    }

    /// Number of samples actually present after the header.
    pub fn sample_count(&self) -> u32 {
        self.samples.len() as u32
    }
}
