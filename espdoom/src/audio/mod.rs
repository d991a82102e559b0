//! Sound effect mixer
//!
//! Eight playback slots share one output stream. Each output sample is
//!
//! ```text
//! music * MUSIC_GAIN + Σ slot.samples[slot.pos >> 8] * SFX_GAIN
//! ```
//!
//! clamped to `[-32768, 32767]`. Slot cursors are 24.8 fixed point and step by
//! `(source_rate << 8) / output_rate` per output sample.

mod device;
#[cfg(feature = "host-audio")]
mod host;
mod mixer;
mod slot;

pub use device::{AudioDevice, AudioDeviceError, PullAudioDevice};
#[cfg(feature = "host-audio")]
pub use host::CpalAudioDevice;
pub use mixer::{MixRenderer, Mixer, MusicSource, Silence, saturate};
pub use slot::{PlaybackSlot, SlotBank};
