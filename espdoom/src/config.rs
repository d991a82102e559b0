//! Configuration management (espdoom.toml)
//!
//! Board and pipeline settings. Every field has a default matching the
//! reference board, so an empty or missing file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use espdoom_shared::constants::{CHUNK_PIXELS, OUTPUT_SAMPLE_RATE, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Shim configuration.
///
/// Serialized to/from TOML format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Mixer settings
    #[serde(default)]
    pub audio: AudioConfig,
    /// LCD and frame pipeline settings
    #[serde(default)]
    pub display: DisplayConfig,
    /// Resource partition layout
    #[serde(default)]
    pub storage: StorageConfig,
    /// Diagnostic binary settings
    #[serde(default)]
    pub selftest: SelftestConfig,
}

/// Audio configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Mixer output rate in Hz (default: 22050)
    #[serde(default = "default_output_sample_rate")]
    pub output_sample_rate: u32,
}

/// Display configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Framebuffer width in pixels (default: 320)
    #[serde(default = "default_width")]
    pub width: usize,
    /// Framebuffer height in pixels (default: 240)
    #[serde(default = "default_height")]
    pub height: usize,
    /// Keep a private frame copy in the display task (default: true)
    #[serde(default = "default_true")]
    pub double_buffer: bool,
    /// Pixels per transfer buffer (default: 3072)
    #[serde(default = "default_chunk_pixels")]
    pub chunk_pixels: usize,
    /// SPI clock (default: 40 MHz)
    #[serde(default = "default_spi_clock_hz")]
    pub spi_clock_hz: u32,
    /// Backlight is lit when its pin is driven low (default: false)
    #[serde(default)]
    pub backlight_active_low: bool,
    /// Reset pulse and post-command settle time in ms (default: 100)
    #[serde(default = "default_reset_delay_ms")]
    pub reset_delay_ms: u64,
}

/// Flash partition layout of the resource images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Resource names, matched case-insensitively (default: doom2.wad, prboom-plus.wad)
    #[serde(default = "default_resources")]
    pub resources: Vec<String>,
    /// Partition type holding the images (default: 66)
    #[serde(default = "default_partition_type")]
    pub partition_type: u8,
    /// Subtype of the first image; the n-th resource uses `first + n` (default: 6)
    #[serde(default = "default_first_partition_subtype")]
    pub first_partition_subtype: u8,
}

/// Settings for `espdoom-selftest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelftestConfig {
    /// Frames pushed through the display pipeline (default: 60)
    #[serde(default = "default_frames")]
    pub frames: u32,
    /// Seconds of audio rendered through the mixer (default: 2)
    #[serde(default = "default_audio_seconds")]
    pub audio_seconds: u32,
    /// Write the rendered mix to this WAV file
    #[serde(default)]
    pub wav_path: Option<PathBuf>,
}

fn default_output_sample_rate() -> u32 {
    OUTPUT_SAMPLE_RATE
}
fn default_width() -> usize {
    SCREEN_WIDTH
}
fn default_height() -> usize {
    SCREEN_HEIGHT
}
fn default_chunk_pixels() -> usize {
    CHUNK_PIXELS
}
fn default_spi_clock_hz() -> u32 {
    40_000_000
}
fn default_reset_delay_ms() -> u64 {
    100
}
fn default_resources() -> Vec<String> {
    vec!["doom2.wad".to_string(), "prboom-plus.wad".to_string()]
}
fn default_partition_type() -> u8 {
    66
}
fn default_first_partition_subtype() -> u8 {
    6
}
fn default_frames() -> u32 {
    60
}
fn default_audio_seconds() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_sample_rate: default_output_sample_rate(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            double_buffer: default_true(),
            chunk_pixels: default_chunk_pixels(),
            spi_clock_hz: default_spi_clock_hz(),
            backlight_active_low: false,
            reset_delay_ms: default_reset_delay_ms(),
        }
    }
}

impl DisplayConfig {
    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    /// Bytes in one indexed frame.
    pub fn frame_len(&self) -> usize {
        self.width * self.height
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            resources: default_resources(),
            partition_type: default_partition_type(),
            first_partition_subtype: default_first_partition_subtype(),
        }
    }
}

impl Default for SelftestConfig {
    fn default() -> Self {
        Self {
            frames: default_frames(),
            audio_seconds: default_audio_seconds(),
            wav_path: None,
        }
    }
}

/// Parse a configuration from TOML.
pub fn from_toml_str(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

/// Loads the configuration from `path`.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load_from(path: &Path) -> Config {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Config {} not readable ({}), using defaults", path.display(), e);
            return Config::default();
        }
    };
    from_toml_str(&content).unwrap_or_else(|e| {
        warn!("Config {} is malformed ({}), using defaults", path.display(), e);
        Config::default()
    })
}

/// Saves the configuration to `path`.
pub fn save_to(path: &Path, config: &Config) -> std::io::Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.audio.output_sample_rate, 22_050);
        assert_eq!(config.display.width, 320);
        assert_eq!(config.display.height, 240);
        assert!(config.display.double_buffer);
        assert_eq!(config.display.chunk_pixels, 3072);
        assert_eq!(config.display.spi_clock_hz, 40_000_000);
        assert_eq!(config.storage.resources, ["doom2.wad", "prboom-plus.wad"]);
        assert_eq!(config.storage.partition_type, 66);
        assert_eq!(config.storage.first_partition_subtype, 6);
        assert!(config.selftest.wav_path.is_none());
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config = from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_deserialize_partial_display() {
        let toml_str = r#"
[display]
double_buffer = false
reset_delay_ms = 0
"#;
        let config = from_toml_str(toml_str).unwrap();
        assert!(!config.display.double_buffer);
        assert_eq!(config.display.reset_delay(), Duration::ZERO);
        assert_eq!(config.display.chunk_pixels, 3072); // default
        assert_eq!(config.audio, AudioConfig::default());
    }

    #[test]
    fn test_config_serialize_roundtrip() {
        let mut config = Config::default();
        config.audio.output_sample_rate = 11_025;
        config.storage.resources = vec!["freedoom1.wad".to_string()];
        config.selftest.wav_path = Some(PathBuf::from("mix.wav"));

        let toml_str = toml::to_string(&config).unwrap();
        let parsed = from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_malformed_is_error() {
        assert!(from_toml_str("[display]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn test_load_from_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert_eq!(load_from(&missing), Config::default());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "audio = 12").unwrap();
        assert_eq!(load_from(&broken), Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("espdoom.toml");
        let mut config = Config::default();
        config.display.chunk_pixels = 1024;
        save_to(&path, &config).unwrap();
        assert_eq!(load_from(&path), config);
    }
}
