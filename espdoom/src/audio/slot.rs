//! Playback slots: one sound effect per slot, read with a 24.8 cursor.

use espdoom_shared::Fixed;
use espdoom_shared::constants::{NUM_SLOTS, SFX_GAIN};
use espdoom_shared::formats::PcmBuffer;

/// Largest sample count whose 24.8 length still fits in an `i32`.
const MAX_SAMPLE_COUNT: u32 = (i32::MAX >> Fixed::FRAC_BITS) as u32;

/// A single sound effect voice.
///
/// Inactive when `samples` is `None`. Only the render callback deactivates a
/// slot; only [`crate::audio::Mixer::start`] activates one.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSlot {
    samples: Option<PcmBuffer>,
    volume: i32,
    rate_inc: Fixed,
    len: Fixed,
    pos: Fixed,
}

impl PlaybackSlot {
    /// A freshly started slot reading `samples` from position zero.
    ///
    /// The step is `(sample_rate << 8) / output_rate`, raised to the smallest
    /// representable step so that every started slot reaches its end.
    pub(crate) fn new(
        samples: PcmBuffer,
        sample_rate: u32,
        sample_count: u32,
        volume: i32,
        output_rate: u32,
    ) -> Self {
        let rate_inc = Fixed::ratio(sample_rate, output_rate).max(Fixed::from_raw(1));
        Self {
            samples: Some(samples),
            volume,
            rate_inc,
            len: Fixed::from_int(sample_count.min(MAX_SAMPLE_COUNT) as i32),
            pos: Fixed::ZERO,
        }
    }

    pub fn is_active(&self) -> bool {
        self.samples.is_some()
    }

    pub fn position(&self) -> Fixed {
        self.pos
    }

    pub fn length(&self) -> Fixed {
        self.len
    }

    pub fn rate_inc(&self) -> Fixed {
        self.rate_inc
    }

    /// Stored but not applied by the mix.
    pub fn volume(&self) -> i32 {
        self.volume
    }

    /// Contribution of this slot to the next output sample.
    ///
    /// Reads `samples[pos.int_part()] * SFX_GAIN`, then advances. The slot goes
    /// inactive once the cursor passes its length, or when the cursor points
    /// past the end of the sample data it was given.
    #[inline]
    pub(crate) fn next_sample(&mut self) -> i32 {
        let Some(samples) = &self.samples else {
            return 0;
        };
        let Some(&sample) = samples.get(self.pos.int_part() as usize) else {
            self.samples = None;
            return 0;
        };
        self.pos += self.rate_inc;
        if self.pos > self.len {
            self.samples = None;
        }
        sample as i32 * SFX_GAIN
    }
}

/// The fixed table of [`NUM_SLOTS`] voices.
#[derive(Debug, Clone, Default)]
pub struct SlotBank {
    slots: [PlaybackSlot; NUM_SLOTS],
}

impl SlotBank {
    pub fn get(&self, index: usize) -> Option<&PlaybackSlot> {
        self.slots.get(index)
    }

    pub(crate) fn replace(&mut self, index: usize, slot: PlaybackSlot) -> PlaybackSlot {
        std::mem::replace(&mut self.slots[index], slot)
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_active()).count()
    }

    /// Sum of every slot's contribution to one output sample.
    #[inline]
    pub(crate) fn mix_next(&mut self) -> i32 {
        self.slots.iter_mut().map(PlaybackSlot::next_sample).sum()
    }
}
