//! espdoom self-test
//!
//! Pushes synthetic frames through the display pipeline on the loopback
//! transport and mixes a synthetic effect through the mixer, then reports what
//! came out. No hardware needed.
//!
//! Usage: `espdoom-selftest [config.toml]`

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use espdoom::config::{self, Config};
use espdoom::display::{DisplayPipeline, LoopbackTransport, NoPins, Palette, PipelineConfig};
use espdoom::shared::constants::{PALETTE_ENTRIES, TRANSFER_POOL_SIZE};
use espdoom::shared::formats::DmxHeader;
use espdoom::shared::lumps::PLAYPAL;
use espdoom::{LumpCache, PullAudioDevice, SoundSystem, VideoSystem};
use tracing::{info, warn};

/// Source rate of the synthetic effect.
const EFFECT_RATE: u16 = 11_025;

/// Samples per pull, roughly one driver callback.
const PULL_SAMPLES: usize = 512;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => config::load_from(Path::new(&path)),
        None => Config::default(),
    };
    info!("{}", espdoom::system::version_string());

    let resources = Arc::new(synthetic_resources());
    run_display(&config, Arc::clone(&resources))?;
    run_audio(&config, resources)?;
    Ok(())
}

/// A grey-ramp `PLAYPAL` and a decaying square wave as `DSPISTOL`.
fn synthetic_resources() -> LumpCache {
    let mut cache = LumpCache::new();

    let playpal: Vec<u8> = (0..PALETTE_ENTRIES)
        .flat_map(|i| [i as u8, i as u8, i as u8])
        .collect();
    cache.insert(PLAYPAL, playpal);

    let count = EFFECT_RATE as usize / 4;
    let mut pistol = DmxHeader::new(EFFECT_RATE, count as u32).to_bytes().to_vec();
    pistol.extend((0..count).map(|i| {
        let amp = 127 * (count - i) / count;
        if (i / 25) % 2 == 0 {
            (128 + amp) as u8
        } else {
            (128 - amp) as u8
        }
    }));
    cache.insert("DSPISTOL", pistol);
    cache
}

fn run_display(config: &Config, resources: Arc<LumpCache>) -> Result<()> {
    let transport = LoopbackTransport::new(TRANSFER_POOL_SIZE).without_capture();
    let log = transport.log();
    let pipeline = DisplayPipeline::spawn(
        PipelineConfig::from(&config.display),
        Arc::new(Palette::new()),
        transport,
        NoPins,
    );

    let mut video = VideoSystem::new(
        resources,
        pipeline,
        config.display.width,
        config.display.height,
    );
    video.pre_init_graphics();
    video.init_graphics();
    video.set_palette(0).context("loading palette")?;

    let started = Instant::now();
    let width = video.width();
    for frame in 0..config.selftest.frames {
        video.start_display();
        for (i, pixel) in video.screen_mut().iter_mut().enumerate() {
            *pixel = ((i % width) as u32 + frame) as u8;
        }
        video.finish_update();
    }
    let submitted = video.pipeline().frames_submitted();
    drop(video);
    let elapsed = started.elapsed();

    let log = log.lock().unwrap_or_else(|e| e.into_inner());
    info!(
        "Display: {} frames submitted in {:.1?}, {} transfers, {} bytes on the bus",
        submitted, elapsed, log.transfers, log.bytes
    );
    Ok(())
}

fn run_audio(config: &Config, resources: Arc<LumpCache>) -> Result<()> {
    let rate = config.audio.output_sample_rate;
    let mut device = PullAudioDevice::new();
    let sound = SoundSystem::init(resources, &mut device, rate).context("binding audio device")?;

    sound
        .start_sound("pistol", 0, 127, 128, 128, 0)
        .context("starting effect")?;

    let total = rate as usize * config.selftest.audio_seconds as usize;
    let mut mix = Vec::with_capacity(total);
    let mut block = [0i16; PULL_SAMPLES];
    while mix.len() < total {
        let n = PULL_SAMPLES.min(total - mix.len());
        device.pull(&mut block[..n]);
        mix.extend_from_slice(&block[..n]);
    }

    let peak = mix.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
    info!(
        "Audio: {} samples at {} Hz, peak {}, {} slots still active",
        mix.len(),
        rate,
        peak,
        sound.mixer().active_slots()
    );

    match &config.selftest.wav_path {
        Some(path) => write_wav(path, rate, &mix)?,
        None => warn!("No selftest.wav_path set, mix not written"),
    }
    Ok(())
}

fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    info!("Mix written to {}", path.display());
    Ok(())
}
