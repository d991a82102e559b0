//! Binary signal with coalescing give.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A flag one side gives and the other side takes.
///
/// Giving an already-given signal is a no-op, so any number of gives between
/// two takes wake the taker once.
#[derive(Debug, Default)]
pub struct BinarySignal {
    given: Mutex<bool>,
    condvar: Condvar,
}

impl BinarySignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn give(&self) {
        let mut given = self.given.lock().unwrap_or_else(|e| e.into_inner());
        *given = true;
        self.condvar.notify_one();
    }

    /// Block until the signal is given, then clear it.
    pub fn take(&self) {
        let mut given = self.given.lock().unwrap_or_else(|e| e.into_inner());
        while !*given {
            given = self.condvar.wait(given).unwrap_or_else(|e| e.into_inner());
        }
        *given = false;
    }

    /// Like [`take`](Self::take) but gives up after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> bool {
        let given = self.given.lock().unwrap_or_else(|e| e.into_inner());
        let (mut given, _) = self
            .condvar
            .wait_timeout_while(given, timeout, |given| !*given)
            .unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *given, false)
    }

    pub fn try_take(&self) -> bool {
        let mut given = self.given.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *given, false)
    }

    pub fn is_given(&self) -> bool {
        *self.given.lock().unwrap_or_else(|e| e.into_inner())
    }
}
