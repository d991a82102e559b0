//! Video interface for the engine.
//!
//! Owns the 8-bit screen the renderer draws into and hands it to the display
//! pipeline once per frame.

use std::sync::Arc;

use espdoom_shared::lumps::PLAYPAL;
use espdoom_shared::{PaletteError, PlayPal};
use tracing::{debug, info, warn};

use crate::display::{DisplayPipeline, Palette};
use crate::resources::ResourceLookup;

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("{} lump not found", PLAYPAL)]
    MissingPalette,

    #[error(transparent)]
    Palette(#[from] PaletteError),
}

/// Pixel format of the engine's screens. Only 8-bit indexed is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoMode {
    #[default]
    Indexed8,
}

pub struct VideoSystem {
    resources: Arc<dyn ResourceLookup>,
    pipeline: DisplayPipeline,
    screen: Box<[u8]>,
    width: usize,
    height: usize,
    mode: Option<VideoMode>,
}

impl VideoSystem {
    pub fn new(
        resources: Arc<dyn ResourceLookup>,
        pipeline: DisplayPipeline,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            resources,
            pipeline,
            screen: Box::default(),
            width,
            height,
            mode: None,
        }
    }

    /// Allocate the screen buffer.
    pub fn pre_init_graphics(&mut self) {
        info!("pre_init_graphics");
        if self.screen.is_empty() {
            self.screen = vec![0; self.width * self.height].into_boxed_slice();
        }
    }

    /// First call selects the video mode; later calls do nothing.
    pub fn init_graphics(&mut self) {
        if self.mode.is_some() {
            return;
        }
        info!("init_graphics: {}x{}", self.width, self.height);
        self.update_video_mode();
    }

    pub fn update_video_mode(&mut self) {
        info!("update_video_mode: {}x{}", self.width, self.height);
        self.pre_init_graphics();
        self.mode = Some(VideoMode::Indexed8);
    }

    pub fn mode(&self) -> Option<VideoMode> {
        self.mode
    }

    pub fn shutdown_graphics(&mut self) {}

    /// Load palette `index` of `PLAYPAL` into the display palette.
    pub fn set_palette(&self, index: usize) -> Result<(), VideoError> {
        let lump = self.resources.lump(PLAYPAL).ok_or(VideoError::MissingPalette)?;
        let table = PlayPal::new(&lump).rgb565(index)?;
        self.pipeline.palette().load(&table);
        debug!("set_palette({})", index);
        Ok(())
    }

    pub fn palette(&self) -> &Arc<Palette> {
        self.pipeline.palette()
    }

    pub fn screen(&self) -> &[u8] {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut [u8] {
        &mut self.screen
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Wait until the screen may be drawn into. Always returns `true`.
    pub fn start_display(&self) -> bool {
        self.pipeline.wait_for_idle();
        true
    }

    pub fn end_display(&self) {}

    /// Present the screen.
    pub fn finish_update(&self) {
        if self.screen.is_empty() {
            warn!("finish_update before pre_init_graphics");
            return;
        }
        self.pipeline.submit_frame(&self.screen);
    }

    pub fn pipeline(&self) -> &DisplayPipeline {
        &self.pipeline
    }
}
