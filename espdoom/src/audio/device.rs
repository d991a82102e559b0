//! Audio driver binding.

use tracing::debug;

use super::mixer::MixRenderer;

#[derive(Debug, thiserror::Error)]
pub enum AudioDeviceError {
    #[error("No audio output device available")]
    NoDevice,

    #[error("Audio device rejected configuration: {0}")]
    Config(String),

    #[error("Failed to build audio stream: {0}")]
    Stream(String),

    #[error("Audio device already has a render callback")]
    AlreadyBound,
}

/// A sink that periodically asks for mixed samples.
///
/// `bind` registers the render callback. It is called once, before any sound
/// is started, and the device invokes [`MixRenderer::render`] from its own
/// context from then on.
pub trait AudioDevice {
    fn bind(&mut self, sample_rate: u32, renderer: MixRenderer) -> Result<(), AudioDeviceError>;
}

/// Device driven by its owner: each [`pull`](Self::pull) is one callback.
#[derive(Default)]
pub struct PullAudioDevice {
    renderer: Option<MixRenderer>,
    sample_rate: u32,
}

impl PullAudioDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.renderer.is_some()
    }

    /// Rate requested at bind time (0 while unbound).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Run the render callback into `out`. Unbound devices output silence.
    pub fn pull(&mut self, out: &mut [i16]) {
        match &mut self.renderer {
            Some(renderer) => renderer.render(out),
            None => out.fill(0),
        }
    }
}

impl AudioDevice for PullAudioDevice {
    fn bind(&mut self, sample_rate: u32, renderer: MixRenderer) -> Result<(), AudioDeviceError> {
        if self.renderer.is_some() {
            return Err(AudioDeviceError::AlreadyBound);
        }
        debug!("Pull device bound at {} Hz", sample_rate);
        self.sample_rate = sample_rate;
        self.renderer = Some(renderer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Mixer, Silence};

    #[test]
    fn test_unbound_outputs_silence() {
        let mut device = PullAudioDevice::new();
        let mut out = [5i16; 16];
        device.pull(&mut out);
        assert_eq!(out, [0; 16]);
        assert!(!device.is_bound());
    }

    #[test]
    fn test_bind_once() {
        let mixer = Mixer::new(22_050);
        let mut device = PullAudioDevice::new();
        device.bind(22_050, mixer.renderer(Silence)).unwrap();
        assert_eq!(device.sample_rate(), 22_050);
        assert!(matches!(
            device.bind(22_050, mixer.renderer(Silence)),
            Err(AudioDeviceError::AlreadyBound)
        ));
    }
}
