//! Host audio output using cpal.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample};
use tracing::{debug, error, info};

use super::device::{AudioDevice, AudioDeviceError};
use super::mixer::MixRenderer;

/// Mono samples rendered per inner pass of the stream callback.
const BLOCK_FRAMES: usize = 1024;

/// Sample formats the mix can be converted to.
const SUPPORTED_FORMATS: [SampleFormat; 3] =
    [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16];

/// Default output device of the host, fed by the mixer at a fixed rate.
///
/// The mono mix is converted to the device's sample format and copied to
/// every channel.
#[derive(Default)]
pub struct CpalAudioDevice {
    stream: Option<cpal::Stream>,
}

impl CpalAudioDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One output configuration range offered by a device.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ConfigRange {
    format: SampleFormat,
    channels: u16,
    min_rate: u32,
    max_rate: u32,
}

/// Pick a range that runs at `sample_rate` in a format the mix converts to.
///
/// Ranges in the device's default format win; otherwise the first usable one.
fn choose_range(
    ranges: impl IntoIterator<Item = ConfigRange>,
    default_format: SampleFormat,
    sample_rate: u32,
) -> Option<ConfigRange> {
    let mut fallback = None;
    for range in ranges {
        if range.channels == 0
            || !SUPPORTED_FORMATS.contains(&range.format)
            || !(range.min_rate..=range.max_rate).contains(&sample_rate)
        {
            continue;
        }
        if range.format == default_format {
            return Some(range);
        }
        fallback.get_or_insert(range);
    }
    fallback
}

fn to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

fn to_i16(sample: i16) -> i16 {
    sample
}

fn to_u16(sample: i16) -> u16 {
    (sample as u16) ^ 0x8000
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut renderer: MixRenderer,
    convert: fn(i16) -> T,
) -> Result<cpal::Stream, AudioDeviceError>
where
    T: SizedSample + Send + 'static,
{
    let channels = config.channels.max(1) as usize;
    let mut mono = vec![0i16; BLOCK_FRAMES];
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frames in data.chunks_mut(BLOCK_FRAMES * channels) {
                    let count = frames.len() / channels;
                    renderer.render(&mut mono[..count]);
                    for (frame, &sample) in frames.chunks_exact_mut(channels).zip(&mono[..count]) {
                        frame.fill(convert(sample));
                    }
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| AudioDeviceError::Stream(e.to_string()))
}

impl AudioDevice for CpalAudioDevice {
    fn bind(&mut self, sample_rate: u32, renderer: MixRenderer) -> Result<(), AudioDeviceError> {
        if self.stream.is_some() {
            return Err(AudioDeviceError::AlreadyBound);
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioDeviceError::NoDevice)?;
        let default_config = device
            .default_output_config()
            .map_err(|e| AudioDeviceError::Config(e.to_string()))?;
        let ranges: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| AudioDeviceError::Config(e.to_string()))?
            .collect();

        let chosen = choose_range(
            ranges.iter().map(|r| ConfigRange {
                format: r.sample_format(),
                channels: r.channels(),
                min_rate: r.min_sample_rate().0,
                max_rate: r.max_sample_rate().0,
            }),
            default_config.sample_format(),
            sample_rate,
        )
        .ok_or_else(|| {
            AudioDeviceError::Config(format!(
                "no output configuration at {} Hz in F32, I16 or U16 (default is {:?} at {} Hz)",
                sample_rate,
                default_config.sample_format(),
                default_config.sample_rate().0
            ))
        })?;

        let config = cpal::StreamConfig {
            channels: chosen.channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let stream = match chosen.format {
            SampleFormat::F32 => build_stream(&device, &config, renderer, to_f32)?,
            SampleFormat::I16 => build_stream(&device, &config, renderer, to_i16)?,
            SampleFormat::U16 => build_stream(&device, &config, renderer, to_u16)?,
            other => {
                return Err(AudioDeviceError::Config(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| AudioDeviceError::Stream(e.to_string()))?;

        info!(
            "Audio output: {} Hz, {} channels, {:?}",
            sample_rate, chosen.channels, chosen.format
        );
        debug!("Device default format: {:?}", default_config.sample_format());
        self.stream = Some(stream);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(format: SampleFormat, min_rate: u32, max_rate: u32) -> ConfigRange {
        ConfigRange {
            format,
            channels: 2,
            min_rate,
            max_rate,
        }
    }

    #[test]
    fn test_prefers_default_format() {
        let ranges = [
            range(SampleFormat::I16, 8_000, 96_000),
            range(SampleFormat::F32, 8_000, 96_000),
        ];
        let chosen = choose_range(ranges, SampleFormat::F32, 22_050).unwrap();
        assert_eq!(chosen.format, SampleFormat::F32);
    }

    #[test]
    fn test_skips_ranges_without_the_rate() {
        // Default F32 only at 48 kHz; I16 covers the mixer rate
        let ranges = [
            range(SampleFormat::F32, 48_000, 48_000),
            range(SampleFormat::I16, 8_000, 48_000),
        ];
        let chosen = choose_range(ranges, SampleFormat::F32, 22_050).unwrap();
        assert_eq!(chosen.format, SampleFormat::I16);
    }

    #[test]
    fn test_no_usable_range() {
        let ranges = [
            range(SampleFormat::F32, 44_100, 48_000),
            range(SampleFormat::I32, 8_000, 96_000),
        ];
        assert!(choose_range(ranges, SampleFormat::F32, 22_050).is_none());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(to_f32(0), 0.0);
        assert_eq!(to_f32(i16::MIN), -1.0);
        assert!(to_f32(i16::MAX) < 1.0);
        assert_eq!(to_i16(-5), -5);
        assert_eq!(to_u16(0), 0x8000);
        assert_eq!(to_u16(i16::MIN), 0);
        assert_eq!(to_u16(i16::MAX), 0xFFFF);
    }
}
