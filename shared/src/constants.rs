//! Centralized constants for the espdoom target.
//!
//! Single source of truth for the audio mixer, the display pipeline and the
//! engine-facing glue.

/// Width of the engine's indexed framebuffer in pixels.
pub const SCREEN_WIDTH: usize = 320;

/// Height of the engine's indexed framebuffer in pixels.
pub const SCREEN_HEIGHT: usize = 240;

/// Output sample rate of the mixer (Hz).
pub const OUTPUT_SAMPLE_RATE: u32 = 22_050;

/// Number of sound effect slots in the mixer.
pub const NUM_SLOTS: usize = 8;

/// Gain applied to each 8-bit sound effect sample before summing.
pub const SFX_GAIN: i32 = 128;

/// Gain applied to the pre-rendered music sample before summing.
pub const MUSIC_GAIN: i32 = 4;

/// Number of pixel transfers kept in flight by the display task.
pub const TRANSFER_POOL_SIZE: usize = 5;

/// Number of header transfers describing the target window.
pub const HEADER_TRANSFERS: usize = 5;

/// Pixels (16-bit words) expanded into each pixel transfer buffer.
pub const CHUNK_PIXELS: usize = 1024 * 3;

/// Engine tics per second.
pub const TICRATE: u64 = 35;

/// 16.16 fixed-point unit used by the engine's timing interface.
pub const FRACUNIT: i32 = 1 << 16;

/// Maximum number of simultaneously open resource images.
pub const MAX_OPEN_FILES: usize = 2;

/// Number of music handles the song table can hold.
pub const MAX_SONGS: usize = 5;

/// Entries in one palette.
pub const PALETTE_ENTRIES: usize = 256;
