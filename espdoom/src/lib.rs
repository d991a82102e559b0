//! espdoom - platform shim for a portable Doom engine
//!
//! Binds the engine's platform callbacks to an embedded target: a SPI
//! framebuffer LCD, memory-mapped flash partitions and a fixed-point mixer.
//!
//! # Architecture
//!
//! ```text
//! Game Thread                 Audio Driver                Display Task
//!     │                            │                           │
//! [start_sound]──(slot lock)──►[MixRenderer::render]           │
//!     │                                                        │
//! [finish_update]──(copy + frame-ready)─────────────────►[header → chunks]
//! [start_display]◄─(transfer-idle, single-buffer mode)────[Transport]
//! ```
//!
//! - [`audio`] - slot bank, mixer and the render callback
//! - [`display`] - palette, transport contract, panel bring-up, frame pipeline
//! - [`sound`], [`music`], [`video`] - engine-facing facades
//! - [`storage`], [`system`] - resource images and timing glue

pub mod audio;
pub mod config;
pub mod display;
pub mod error;
pub mod music;
pub mod resources;
pub mod sound;
pub mod storage;
pub mod system;
pub mod video;

pub use espdoom_shared as shared;

pub use audio::{AudioDevice, Mixer, MixRenderer, PullAudioDevice};
pub use config::Config;
pub use display::{DisplayPipeline, Palette, Transport};
pub use error::{SoundError, fatal};
pub use resources::{LumpCache, ResourceLookup};
pub use sound::SoundSystem;
pub use video::VideoSystem;
