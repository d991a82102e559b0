//! Timing and miscellaneous system glue.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use espdoom_shared::constants::{FRACUNIT, TICRATE};

/// Wall-clock source.
pub trait Clock: Send + Sync {
    /// Time since the clock's origin.
    fn now(&self) -> Duration;

    fn now_ms(&self) -> u64 {
        self.now().as_millis() as u64
    }
}

/// `std::time` wall clock, measured from the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// Engine tics since the clock's origin: `secs * TICRATE + usecs * TICRATE / 10^6`.
pub fn get_time_realtime(clock: &dyn Clock) -> i32 {
    let now = clock.now();
    let tics = now.as_secs() * TICRATE + now.subsec_micros() as u64 * TICRATE / 1_000_000;
    tics as i32
}

/// Sub-tic interpolation state for smooth movement.
#[derive(Debug, Clone, Copy)]
pub struct TicTimer {
    /// Interpolation is on; `save_ms` does nothing otherwise.
    pub movement_smooth: bool,
    /// Tics per millisecond at the current game speed.
    pub msec: f64,
    start: u64,
    next: u64,
    step: u64,
}

impl TicTimer {
    /// Timer at normal game speed.
    pub fn new(movement_smooth: bool) -> Self {
        Self::with_speed(movement_smooth, 100)
    }

    /// Timer at `percent` of normal game speed.
    pub fn with_speed(movement_smooth: bool, percent: u32) -> Self {
        Self {
            movement_smooth,
            msec: percent as f64 * TICRATE as f64 / 100_000.0,
            start: 0,
            next: 0,
            step: 0,
        }
    }

    /// Record the start of the current tic and the length of its step.
    pub fn save_ms(&mut self, clock: &dyn Clock) {
        if !self.movement_smooth {
            return;
        }
        self.start = clock.now_ms();
        self.next = ((self.start as f64 * self.msec + 1.0) / self.msec) as u64;
        self.step = self.next.saturating_sub(self.start);
    }

    /// Fraction of the current tic elapsed, in `[0, FRACUNIT]`.
    ///
    /// `FRACUNIT` when no step has been recorded.
    pub fn get_time_frac(&self, clock: &dyn Clock) -> i32 {
        if self.step == 0 {
            return FRACUNIT;
        }
        let elapsed = clock.now_ms() as i64 - self.start as i64;
        let frac = elapsed * FRACUNIT as i64 / self.step as i64;
        frac.clamp(0, FRACUNIT as i64) as i32
    }

    pub fn step(&self) -> u64 {
        self.step
    }
}

/// Sleep with millisecond granularity. Sub-millisecond requests return at once.
pub fn sleep_us(usecs: u64) {
    let ms = usecs / 1000;
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// Fixed seed for the engine's random time seed.
pub fn random_time_seed() -> u64 {
    4
}

pub fn version_string() -> String {
    format!(
        "{} v{} (http://prboom.sourceforge.net/)",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}
