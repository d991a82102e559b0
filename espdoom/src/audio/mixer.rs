//! Slot control and the real-time render callback.
//!
//! [`Mixer`] is the game-thread side: it installs sounds into slots.
//! [`MixRenderer`] is handed to the audio device and produces the output
//! stream. Both share one [`SlotBank`] behind a mutex. The renderer takes the
//! lock once per callback; `start` holds it only while swapping one slot.

use std::sync::{Arc, Mutex, MutexGuard};

use espdoom_shared::constants::{MUSIC_GAIN, NUM_SLOTS};
use espdoom_shared::formats::PcmBuffer;
use tracing::{debug, trace, warn};

use super::slot::{PlaybackSlot, SlotBank};
use crate::error::SoundError;

/// Supplier of the pre-rendered music sample for each output sample.
///
/// Called from the audio driver's context. Implementations must not block.
pub trait MusicSource: Send {
    /// Fill `out` with one music sample per output sample.
    fn render(&mut self, out: &mut [i32]);
}

/// Music source that produces nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silence;

impl MusicSource for Silence {
    fn render(&mut self, out: &mut [i32]) {
        out.fill(0);
    }
}

struct MixerShared {
    slots: Mutex<SlotBank>,
    output_rate: u32,
}

impl MixerShared {
    fn lock(&self) -> MutexGuard<'_, SlotBank> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Game-thread handle to the slot bank.
#[derive(Clone)]
pub struct Mixer {
    shared: Arc<MixerShared>,
}

impl Mixer {
    pub fn new(output_rate: u32) -> Self {
        Self {
            shared: Arc::new(MixerShared {
                slots: Mutex::new(SlotBank::default()),
                output_rate,
            }),
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.shared.output_rate
    }

    /// Install a sound into `slot`, replacing whatever it was playing.
    ///
    /// Returns the slot index as the handle. The previous sample data is
    /// released after the lock is dropped.
    pub fn start(
        &self,
        slot: i32,
        samples: PcmBuffer,
        sample_rate: u32,
        sample_count: u32,
        volume: i32,
    ) -> Result<i32, SoundError> {
        let index = usize::try_from(slot)
            .ok()
            .filter(|&i| i < NUM_SLOTS)
            .ok_or_else(|| {
                warn!("start: no slot {}", slot);
                SoundError::NoSlot(slot)
            })?;

        let fresh = PlaybackSlot::new(
            samples,
            sample_rate,
            sample_count,
            volume,
            self.shared.output_rate,
        );
        trace!(
            "Slot {} start: {} samples @ {} Hz, step {:?}",
            index,
            sample_count,
            sample_rate,
            fresh.rate_inc()
        );

        let previous = {
            let mut bank = self.shared.lock();
            bank.replace(index, fresh)
        };
        drop(previous);
        Ok(slot)
    }

    /// Accepted and ignored.
    pub fn stop(&self, handle: i32) {
        trace!("stop({}) ignored", handle);
    }

    /// Accepted and ignored.
    pub fn update_params(&self, handle: i32, volume: i32, separation: i32, pitch: i32) {
        trace!(
            "update_params({}, vol {}, sep {}, pitch {}) ignored",
            handle, volume, separation, pitch
        );
    }

    /// Always `false`; the engine only uses this to decide whether to restart.
    pub fn is_playing(&self, _handle: i32) -> bool {
        false
    }

    /// Always `false`.
    pub fn any_playing(&self) -> bool {
        false
    }

    /// Copy of the slot state at `index`, for inspection.
    pub fn slot(&self, index: usize) -> Option<PlaybackSlot> {
        self.shared.lock().get(index).cloned()
    }

    /// Number of slots currently producing samples.
    pub fn active_slots(&self) -> usize {
        self.shared.lock().active_count()
    }

    /// Build the render callback for an audio device.
    pub fn renderer(&self, music: impl MusicSource + 'static) -> MixRenderer {
        MixRenderer {
            shared: Arc::clone(&self.shared),
            music: Box::new(music),
            scratch: None,
        }
    }
}

/// Render callback state, owned by the audio device.
///
/// The scratch buffer for music samples is allocated on the first callback,
/// sized to that callback's request, and never resized. Larger requests are
/// rendered in pieces of that size.
pub struct MixRenderer {
    shared: Arc<MixerShared>,
    music: Box<dyn MusicSource>,
    scratch: Option<Box<[i32]>>,
}

impl MixRenderer {
    /// Fill `out` with mixed, saturated 16-bit samples.
    pub fn render(&mut self, out: &mut [i16]) {
        if out.is_empty() {
            return;
        }
        let scratch = self.scratch.get_or_insert_with(|| {
            debug!("Mixer scratch buffer: {} samples", out.len());
            vec![0; out.len()].into_boxed_slice()
        });

        let mut bank = self.shared.lock();
        for chunk in out.chunks_mut(scratch.len()) {
            let music = &mut scratch[..chunk.len()];
            self.music.render(music);
            for (sample, &m) in chunk.iter_mut().zip(music.iter()) {
                let acc = m.saturating_mul(MUSIC_GAIN).saturating_add(bank.mix_next());
                *sample = saturate(acc);
            }
        }
    }
}

/// Clamp a mixed sample to the symmetric 16-bit range.
#[inline]
pub fn saturate(acc: i32) -> i16 {
    acc.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[u8]) -> PcmBuffer {
        PcmBuffer::new(Arc::from(samples))
    }

    struct Constant(i32);

    impl MusicSource for Constant {
        fn render(&mut self, out: &mut [i32]) {
            out.fill(self.0);
        }
    }

    #[test]
    fn test_saturate_bounds() {
        assert_eq!(saturate(40_000), 32_767);
        assert_eq!(saturate(-40_000), -32_768);
        assert_eq!(saturate(-32_768), -32_768);
        assert_eq!(saturate(1234), 1234);
    }

    #[test]
    fn test_render_silence_when_idle() {
        let mixer = Mixer::new(22_050);
        let mut renderer = mixer.renderer(Silence);
        let mut out = [7i16; 32];
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_music_gain() {
        let mixer = Mixer::new(22_050);
        let mut renderer = mixer.renderer(Constant(100));
        let mut out = [0i16; 8];
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 400));
    }

    #[test]
    fn test_start_rejects_out_of_range() {
        let mixer = Mixer::new(22_050);
        for slot in [-1, 8, 100] {
            let err = mixer.start(slot, pcm(&[1]), 22_050, 1, 127).unwrap_err();
            assert!(matches!(err, SoundError::NoSlot(s) if s == slot));
        }
        assert_eq!(mixer.active_slots(), 0);
    }

    #[test]
    fn test_start_and_render_one_sound() {
        let mixer = Mixer::new(22_050);
        let mut renderer = mixer.renderer(Silence);
        assert_eq!(mixer.start(3, pcm(&[1, 2]), 22_050, 2, 127).unwrap(), 3);
        let mut out = [0i16; 4];
        renderer.render(&mut out);
        assert_eq!(out, [128, 256, 0, 0]);
        assert!(!mixer.slot(3).unwrap().is_active());
    }

    #[test]
    fn test_larger_request_uses_first_scratch_size() {
        let mixer = Mixer::new(22_050);
        let mut renderer = mixer.renderer(Constant(1));
        let mut first = [0i16; 4];
        renderer.render(&mut first);
        let mut second = [0i16; 10];
        renderer.render(&mut second);
        assert!(second.iter().all(|&s| s == 4));
    }

    #[test]
    fn test_stubs() {
        let mixer = Mixer::new(22_050);
        mixer.start(0, pcm(&[1; 64]), 22_050, 64, 127).unwrap();
        mixer.stop(0);
        mixer.update_params(0, 1, 2, 3);
        assert!(!mixer.is_playing(0));
        assert!(!mixer.any_playing());
        assert!(mixer.slot(0).unwrap().is_active());
    }
}
