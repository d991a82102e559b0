//! Engine-facing video calls driving the pipeline.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use espdoom::config::DisplayConfig;
use espdoom::display::transport::TransportLog;
use espdoom::display::{DisplayPipeline, LoopbackTransport, NoPins, Palette, PipelineConfig};
use espdoom::shared::constants::TRANSFER_POOL_SIZE;
use espdoom::shared::formats::PALETTE_BYTES;
use espdoom::shared::lumps::PLAYPAL;
use espdoom::video::VideoError;
use espdoom::{LumpCache, VideoSystem};

fn video(resources: LumpCache, double_buffer: bool) -> (VideoSystem, Arc<Mutex<TransportLog>>) {
    let display = DisplayConfig {
        double_buffer,
        reset_delay_ms: 0,
        ..DisplayConfig::default()
    };
    let transport = LoopbackTransport::new(TRANSFER_POOL_SIZE);
    let log = transport.log();
    let pipeline = DisplayPipeline::spawn(
        PipelineConfig::from(&display),
        Arc::new(Palette::new()),
        transport,
        NoPins,
    );
    let video = VideoSystem::new(Arc::new(resources), pipeline, display.width, display.height);
    (video, log)
}

/// Two palettes: the first all black except entry 255 (white), the second red.
fn playpal() -> LumpCache {
    let mut lump = vec![0u8; PALETTE_BYTES * 2];
    lump[255 * 3..256 * 3].fill(0xFF);
    for rgb in lump[PALETTE_BYTES..].chunks_exact_mut(3) {
        rgb[0] = 0xFF;
    }
    let mut cache = LumpCache::new();
    cache.insert(PLAYPAL, lump);
    cache
}

#[test]
fn test_set_palette_converts_every_entry() {
    let (video, _log) = video(playpal(), true);
    video.set_palette(0).unwrap();
    assert_eq!(video.palette().get(0), 0x0000);
    assert_eq!(video.palette().get(255), 0xFFFF);

    video.set_palette(1).unwrap();
    assert!(video.palette().snapshot().iter().all(|&c| c == 0xF800));

    assert!(matches!(video.set_palette(2), Err(VideoError::Palette(_))));
}

#[test]
fn test_missing_playpal() {
    let (video, _log) = video(LumpCache::new(), true);
    assert!(matches!(video.set_palette(0), Err(VideoError::MissingPalette)));
}

#[test]
fn test_init_and_present() {
    let (mut video, log) = video(playpal(), false);
    video.pre_init_graphics();
    video.init_graphics();
    video.init_graphics();
    assert!(video.mode().is_some());
    assert_eq!(video.screen().len(), 320 * 240);
    video.set_palette(0).unwrap();

    assert!(video.start_display());
    video.screen_mut().fill(255);
    video.finish_update();
    assert!(video.start_display());

    let deadline = Instant::now() + Duration::from_secs(10);
    while video.pipeline().frames_streamed() < 1 {
        assert!(Instant::now() < deadline, "timed out");
        thread::sleep(Duration::from_millis(1));
    }
    let log = log.lock().unwrap();
    let frame = log.last_frame().unwrap();
    assert_eq!(frame.len(), 320 * 240 * 2);
    assert!(frame.iter().all(|&b| b == 0xFF));
}
