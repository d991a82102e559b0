//! Frame pipeline: game thread to display task.
//!
//! The game thread submits whole indexed frames. The display task wakes on the
//! frame-ready signal, sends the window header, then expands the frame through
//! the palette in chunks and streams them with up to
//! [`TRANSFER_POOL_SIZE`] transfers in flight.
//!
//! # Buffering
//!
//! In both modes `submit_frame` copies into the pending frame, and the task
//! swaps pending and active under the lock before streaming, so the lock is
//! never held across a transfer.
//!
//! - Double-buffered: `submit_frame` never waits. Frames submitted while the
//!   task is busy coalesce into the latest one.
//! - Single-buffered: the task also gives the transfer-idle signal once every
//!   transfer of the frame has completed. The game thread calls
//!   `wait_for_idle` before presenting the next frame.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use espdoom_shared::constants::{HEADER_TRANSFERS, TRANSFER_POOL_SIZE};
use tracing::{debug, trace, warn};

use super::palette::Palette;
use super::panel::{self, PanelConfig, PanelPins};
use super::signal::BinarySignal;
use super::transport::{DmaBuffer, Transfer, Transport};
use crate::config::DisplayConfig;
use crate::error::fatal;

/// Geometry and buffering of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub width: u16,
    pub height: u16,
    pub chunk_pixels: usize,
    pub double_buffer: bool,
    pub panel: PanelConfig,
}

impl PipelineConfig {
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl From<&DisplayConfig> for PipelineConfig {
    fn from(config: &DisplayConfig) -> Self {
        Self {
            width: u16::try_from(config.width).unwrap_or(u16::MAX),
            height: u16::try_from(config.height).unwrap_or(u16::MAX),
            chunk_pixels: config.chunk_pixels.max(1),
            double_buffer: config.double_buffer,
            panel: PanelConfig {
                spi_clock_hz: config.spi_clock_hz,
                backlight_active_low: config.backlight_active_low,
                settle_delay: config.reset_delay(),
            },
        }
    }
}

struct PipelineShared {
    pending: Mutex<Box<[u8]>>,
    frame_ready: BinarySignal,
    idle: BinarySignal,
    palette: Arc<Palette>,
    shutdown: AtomicBool,
    frames_submitted: AtomicU64,
    frames_streamed: AtomicU64,
}

impl PipelineShared {
    fn lock_pending(&self) -> MutexGuard<'_, Box<[u8]>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Game-thread handle to the display task.
///
/// Dropping it stops the task after the frame in progress and joins it.
pub struct DisplayPipeline {
    shared: Arc<PipelineShared>,
    double_buffer: bool,
    task: Option<JoinHandle<()>>,
}

impl DisplayPipeline {
    /// Start the display task on its own thread.
    ///
    /// The task brings the panel up, gives the transfer-idle signal once and
    /// then waits for frames. A bring-up failure aborts the process.
    pub fn spawn<T, P>(config: PipelineConfig, palette: Arc<Palette>, transport: T, pins: P) -> Self
    where
        T: Transport + 'static,
        P: PanelPins + 'static,
    {
        let frame_len = config.frame_len();
        let shared = Arc::new(PipelineShared {
            pending: Mutex::new(vec![0; frame_len].into_boxed_slice()),
            frame_ready: BinarySignal::new(),
            idle: BinarySignal::new(),
            palette,
            shutdown: AtomicBool::new(false),
            frames_submitted: AtomicU64::new(0),
            frames_streamed: AtomicU64::new(0),
        });

        let task = DisplayTask {
            shared: Arc::clone(&shared),
            streamer: FrameStreamer::new(transport, &config),
            active: vec![0; frame_len].into_boxed_slice(),
            double_buffer: config.double_buffer,
        };
        let panel_config = config.panel.clone();
        let handle = thread::Builder::new()
            .name("display".to_string())
            .spawn(move || task.run(pins, &panel_config))
            .unwrap_or_else(|e| fatal("Failed to spawn display task", e));

        debug!(
            "Display pipeline: {}x{}, {} px/chunk, double buffer {}",
            config.width, config.height, config.chunk_pixels, config.double_buffer
        );
        Self {
            shared,
            double_buffer: config.double_buffer,
            task: Some(handle),
        }
    }

    /// Hand a complete indexed frame to the display task.
    ///
    /// Copies the frame and gives the frame-ready signal. Only waits for the
    /// task to finish swapping frames, never for the panel.
    pub fn submit_frame(&self, frame: &[u8]) {
        {
            let mut pending = self.shared.lock_pending();
            if frame.len() != pending.len() {
                warn!(
                    "submit_frame: {} bytes, expected {}",
                    frame.len(),
                    pending.len()
                );
            }
            let len = frame.len().min(pending.len());
            pending[..len].copy_from_slice(&frame[..len]);
        }
        self.shared.frames_submitted.fetch_add(1, Ordering::Relaxed);
        self.shared.frame_ready.give();
    }

    /// Block until every transfer of the last submitted frame has completed.
    ///
    /// Returns at once in double-buffered mode.
    pub fn wait_for_idle(&self) {
        if !self.double_buffer {
            self.shared.idle.take();
        }
    }

    pub fn palette(&self) -> &Arc<Palette> {
        &self.shared.palette
    }

    pub fn is_double_buffered(&self) -> bool {
        self.double_buffer
    }

    pub fn frames_submitted(&self) -> u64 {
        self.shared.frames_submitted.load(Ordering::Relaxed)
    }

    /// Frames fully drained to the transport so far.
    pub fn frames_streamed(&self) -> u64 {
        self.shared.frames_streamed.load(Ordering::Acquire)
    }
}

impl Drop for DisplayPipeline {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.frame_ready.give();
        if let Some(handle) = self.task.take() {
            let _ = handle.join();
        }
    }
}

struct DisplayTask<T: Transport> {
    shared: Arc<PipelineShared>,
    streamer: FrameStreamer<T>,
    /// Frame being streamed.
    active: Box<[u8]>,
    double_buffer: bool,
}

impl<T: Transport> DisplayTask<T> {
    fn run<P: PanelPins>(mut self, mut pins: P, panel_config: &PanelConfig) {
        if let Err(e) = panel::bring_up(&mut self.streamer.transport, &mut pins, panel_config) {
            fatal("Display bring-up failed", e);
        }
        self.shared.idle.give();

        loop {
            self.shared.frame_ready.take();
            if self.shared.shutdown.load(Ordering::Acquire) {
                break;
            }

            std::mem::swap(&mut *self.shared.lock_pending(), &mut self.active);
            self.streamer.send_header();
            self.streamer.stream(&self.active, &self.shared.palette);
            self.streamer.drain();

            let streamed = self.shared.frames_streamed.fetch_add(1, Ordering::Release) + 1;
            trace!("Display task: frame {} done", streamed);
            if !self.double_buffer {
                self.shared.idle.give();
            }
        }
        debug!("Display task stopped");
    }
}

/// Transport plus the pool of pixel buffers cycling through it.
struct FrameStreamer<T: Transport> {
    transport: T,
    /// `None` while the buffer is owned by the transport.
    pool: [Option<DmaBuffer>; TRANSFER_POOL_SIZE],
    next: usize,
    in_flight: usize,
    chunk_pixels: usize,
    width: u16,
    height: u16,
}

impl<T: Transport> FrameStreamer<T> {
    fn new(transport: T, config: &PipelineConfig) -> Self {
        let chunk_pixels = config.chunk_pixels.max(1);
        let chunk_bytes = chunk_pixels * 2;
        Self {
            transport,
            pool: std::array::from_fn(|_| Some(DmaBuffer::with_capacity(chunk_bytes))),
            next: 0,
            in_flight: 0,
            chunk_pixels,
            width: config.width,
            height: config.height,
        }
    }

    /// Queue the window header and wait for all of it.
    fn send_header(&mut self) {
        for transfer in panel::window_header(0, 0, self.width, self.height) {
            if let Err(e) = self.transport.queue(transfer) {
                fatal("Header transfer failed", e);
            }
        }
        for expected in 0..HEADER_TRANSFERS {
            let done = self
                .transport
                .wait_result()
                .unwrap_or_else(|e| fatal("Header transfer failed", e));
            if done.descriptor != expected {
                fatal(
                    "Header transfers completed out of order",
                    format_args!("got #{}, expected #{}", done.descriptor, expected),
                );
            }
        }
    }

    /// Expand and queue every chunk of `frame`. Leaves up to a full pool in
    /// flight; call [`drain`](Self::drain) afterwards.
    fn stream(&mut self, frame: &[u8], palette: &Palette) {
        for chunk in frame.chunks(self.chunk_pixels) {
            let index = self.next;
            let Some(mut buffer) = self.pool[index].take() else {
                fatal("Transfer buffer reused while in flight", index);
            };
            let written = palette.expand(chunk, buffer.storage_mut());
            buffer.set_len(written);
            if let Err(e) = self.transport.queue(Transfer::dma(index, buffer)) {
                fatal("Pixel transfer failed", e);
            }
            self.next = (index + 1) % TRANSFER_POOL_SIZE;
            self.in_flight += 1;
            if self.in_flight == TRANSFER_POOL_SIZE {
                self.retire_oldest();
            }
        }
    }

    fn drain(&mut self) {
        while self.in_flight > 0 {
            self.retire_oldest();
        }
    }

    /// Wait for the oldest pixel transfer and put its buffer back in the pool.
    fn retire_oldest(&mut self) {
        let expected = (self.next + TRANSFER_POOL_SIZE - self.in_flight) % TRANSFER_POOL_SIZE;
        let done = self
            .transport
            .wait_result()
            .unwrap_or_else(|e| fatal("Pixel transfer failed", e));
        if done.descriptor != expected {
            fatal(
                "Pixel transfers completed out of order",
                format_args!("got #{}, expected #{}", done.descriptor, expected),
            );
        }
        let descriptor = done.descriptor;
        match done.into_dma_buffer() {
            Some(buffer) => self.pool[descriptor] = Some(buffer),
            None => fatal("Pixel transfer returned without its buffer", descriptor),
        }
        self.in_flight -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::transport::{LoopbackTransport, TransportEvent};
    use std::time::Duration;

    fn test_config(double_buffer: bool) -> PipelineConfig {
        PipelineConfig {
            width: 16,
            height: 4,
            chunk_pixels: 8,
            double_buffer,
            panel: PanelConfig {
                spi_clock_hz: 40_000_000,
                backlight_active_low: false,
                settle_delay: Duration::ZERO,
            },
        }
    }

    #[test]
    fn test_streamer_keeps_pool_bounded() {
        let config = test_config(true);
        let transport = LoopbackTransport::new(TRANSFER_POOL_SIZE);
        let log = transport.log();
        let mut streamer = FrameStreamer::new(transport, &config);
        let palette = Palette::new();

        // 64 pixels / 8 per chunk = 8 chunks, more than the pool
        streamer.stream(&[0u8; 64], &palette);
        assert_eq!(streamer.in_flight, TRANSFER_POOL_SIZE - 1);
        streamer.drain();
        assert_eq!(streamer.in_flight, 0);
        assert!(streamer.pool.iter().all(Option::is_some));

        let log = log.lock().unwrap();
        let mut outstanding = 0usize;
        let mut peak = 0usize;
        for event in &log.events {
            match event {
                TransportEvent::Queued { .. } => outstanding += 1,
                TransportEvent::Completed { .. } => outstanding -= 1,
            }
            peak = peak.max(outstanding);
        }
        assert_eq!(peak, TRANSFER_POOL_SIZE);
        assert_eq!(outstanding, 0);
    }

    #[test]
    fn test_descriptors_cycle_through_pool() {
        let config = test_config(true);
        let transport = LoopbackTransport::new(TRANSFER_POOL_SIZE);
        let log = transport.log();
        let mut streamer = FrameStreamer::new(transport, &config);
        streamer.stream(&[0u8; 64], &Palette::new());
        streamer.drain();

        let queued: Vec<usize> = log
            .lock()
            .unwrap()
            .events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Queued { descriptor, .. } => Some(*descriptor),
                TransportEvent::Completed { .. } => None,
            })
            .collect();
        assert_eq!(queued, [0, 1, 2, 3, 4, 0, 1, 2]);
    }

    #[test]
    fn test_from_display_config() {
        let config = PipelineConfig::from(&DisplayConfig::default());
        assert_eq!(config.width, 320);
        assert_eq!(config.height, 240);
        assert_eq!(config.frame_len(), 76_800);
        assert_eq!(config.frame_len() / config.chunk_pixels, 25);
        assert_eq!(config.panel.settle_delay, Duration::from_millis(100));
    }
}
