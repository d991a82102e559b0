//! Sound effect interface for the engine.
//!
//! Resolves effect names to DMX lumps and starts them on the mixer. Handles are
//! slot indices; anything that goes wrong turns into [`SoundError`], which the
//! engine sees as [`SoundError::SENTINEL`].

use std::sync::Arc;

use espdoom_shared::constants::NUM_SLOTS;
use espdoom_shared::{DmxSound, sound_lump_name};
use tracing::{info, warn};

use crate::audio::{AudioDevice, AudioDeviceError, Mixer, Silence};
use crate::error::SoundError;
use crate::resources::ResourceLookup;

/// Engine-facing sound system.
pub struct SoundSystem {
    mixer: Mixer,
    resources: Arc<dyn ResourceLookup>,
    initialised: bool,
}

impl SoundSystem {
    /// Create the mixer and bind its render callback to `device`.
    pub fn init(
        resources: Arc<dyn ResourceLookup>,
        device: &mut dyn AudioDevice,
        output_rate: u32,
    ) -> Result<Self, AudioDeviceError> {
        let mixer = Mixer::new(output_rate);
        device.bind(output_rate, mixer.renderer(Silence))?;
        info!("Sound system ready at {} Hz", output_rate);
        Ok(Self {
            mixer,
            resources,
            initialised: true,
        })
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Start the named effect on `channel`. Returns the handle.
    ///
    /// Separation, pitch and priority are accepted and ignored.
    pub fn start_sound(
        &self,
        sfx_name: &str,
        channel: i32,
        volume: i32,
        _separation: i32,
        _pitch: i32,
        _priority: i32,
    ) -> Result<i32, SoundError> {
        if !self.initialised {
            return Err(SoundError::NotInitialised);
        }
        if !(0..NUM_SLOTS as i32).contains(&channel) {
            warn!("start_sound: channel {} out of range", channel);
            return Err(SoundError::NoSlot(channel));
        }

        let lump_name = sound_lump_name(sfx_name);
        let lump = self.resources.lump(&lump_name).ok_or_else(|| {
            warn!("start_sound: no lump {}", lump_name);
            SoundError::LumpNotFound(lump_name.clone())
        })?;
        let sound = DmxSound::parse(lump).inspect_err(|e| warn!("start_sound: {}: {}", lump_name, e))?;

        let rate = sound.sample_rate();
        let count = sound.sample_count();
        self.mixer.start(channel, sound.samples, rate, count, volume)
    }

    /// [`start_sound`](Self::start_sound) with errors folded into the sentinel.
    pub fn start_sound_handle(&self, sfx_name: &str, channel: i32, volume: i32) -> i32 {
        self.start_sound(sfx_name, channel, volume, 128, 128, 0)
            .unwrap_or(SoundError::SENTINEL)
    }

    pub fn stop_sound(&self, handle: i32) {
        self.mixer.stop(handle);
    }

    pub fn update_sound_params(&self, handle: i32, volume: i32, separation: i32, pitch: i32) {
        self.mixer.update_params(handle, volume, separation, pitch);
    }

    pub fn sound_is_playing(&self, handle: i32) -> bool {
        self.mixer.is_playing(handle)
    }

    pub fn any_sound_playing(&self) -> bool {
        self.mixer.any_playing()
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Stop accepting new sounds. Slots already playing run to their end.
    pub fn shutdown(&mut self) {
        if self.initialised {
            info!("Sound system shut down");
            self.initialised = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PullAudioDevice;
    use crate::resources::LumpCache;
    use espdoom_shared::formats::DmxHeader;

    fn dmx(rate: u16, samples: &[u8]) -> Vec<u8> {
        let mut lump = DmxHeader::new(rate, samples.len() as u32).to_bytes().to_vec();
        lump.extend_from_slice(samples);
        lump
    }

    fn system() -> (SoundSystem, PullAudioDevice) {
        let mut cache = LumpCache::new();
        cache.insert("DSPISTOL", dmx(22_050, &[1, 2, 3]));
        let mut bad = dmx(22_050, &[1]);
        bad[0] = 2;
        cache.insert("DSBAD", bad);
        let mut device = PullAudioDevice::new();
        let sound = SoundSystem::init(Arc::new(cache), &mut device, 22_050).unwrap();
        (sound, device)
    }

    #[test]
    fn test_start_sound_by_name() {
        let (sound, mut device) = system();
        assert_eq!(sound.start_sound("pistol", 2, 127, 128, 128, 0).unwrap(), 2);
        let mut out = [0i16; 4];
        device.pull(&mut out);
        assert_eq!(out, [128, 256, 384, 0]);
    }

    #[test]
    fn test_errors_map_to_sentinel() {
        let (sound, _device) = system();
        assert!(matches!(
            sound.start_sound("nope", 0, 127, 128, 128, 0),
            Err(SoundError::LumpNotFound(name)) if name == "DSNOPE"
        ));
        // Lookup uses the 8-character lump name
        assert!(matches!(
            sound.start_sound("missing", 0, 127, 128, 128, 0),
            Err(SoundError::LumpNotFound(name)) if name == "DSMISSIN"
        ));
        assert!(matches!(
            sound.start_sound("bad", 0, 127, 128, 128, 0),
            Err(SoundError::Format(_))
        ));
        assert_eq!(sound.start_sound_handle("pistol", 8, 127), SoundError::SENTINEL);
        assert_eq!(sound.start_sound_handle("missing", 0, 127), SoundError::SENTINEL);
        assert_eq!(sound.mixer().active_slots(), 0);
    }

    #[test]
    fn test_shutdown_rejects_new_sounds() {
        let (mut sound, _device) = system();
        sound.shutdown();
        assert!(!sound.is_initialised());
        assert!(matches!(
            sound.start_sound("pistol", 0, 127, 128, 128, 0),
            Err(SoundError::NotInitialised)
        ));
    }
}
