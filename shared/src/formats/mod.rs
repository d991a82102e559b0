//! Resource formats read from the engine's lump cache.
//!
//! Both formats are little-endian POD records without magic bytes; the lump
//! name decides how a buffer is interpreted.

pub mod dmx_sound;
pub mod playpal;

pub use dmx_sound::*;
pub use playpal::*;
