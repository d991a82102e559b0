//! Shared types for the espdoom platform shim.
//!
//! Everything in here is plain data: hardware constants, the 24.8 fixed-point
//! type used by the mixer, and parsers for the two resource formats the shim
//! reads out of the engine's lump cache (DMX sound effects and `PLAYPAL`).

pub mod constants;
pub mod fixed;
pub mod formats;
pub mod lumps;

pub use fixed::Fixed;
pub use formats::{DmxFormatError, DmxSound, PaletteError, PlayPal, rgb_to_rgb565};
pub use lumps::sound_lump_name;
