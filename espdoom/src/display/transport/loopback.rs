//! Software transport: completes every transfer immediately, in order.

use std::sync::{Arc, Mutex, MutexGuard};

use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer};
use tracing::trace;

use super::{DcLine, PreTransferHook, Transfer, Transport, TransportError};
use crate::display::panel::cmd;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Queued {
        descriptor: usize,
        dc: DcLine,
        len: usize,
    },
    Completed {
        descriptor: usize,
    },
}

/// What went over the loopback bus.
#[derive(Debug, Default, Clone)]
pub struct TransportLog {
    /// Queue and completion events, in order.
    pub events: Vec<TransportEvent>,
    /// Every command byte sent.
    pub commands: Vec<u8>,
    /// Data bytes following each memory-write command, one entry per
    /// memory write that carried data.
    pub frames: Vec<Vec<u8>>,
    pub transfers: u64,
    pub bytes: u64,
}

impl TransportLog {
    pub fn last_frame(&self) -> Option<&[u8]> {
        self.frames.last().map(Vec::as_slice)
    }
}

/// In-memory stand-in for the SPI bus.
///
/// Holds at most `capacity` transfers in flight. A transfer "goes on the wire"
/// when queued: the pre-transfer hook runs and the bytes are logged. Waiting
/// hands transfers back oldest first.
pub struct LoopbackTransport {
    in_flight: HeapRb<Transfer>,
    hook: Option<PreTransferHook>,
    log: Arc<Mutex<TransportLog>>,
    capture: bool,
    in_frame: bool,
    frame_started: bool,
}

impl LoopbackTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            in_flight: HeapRb::new(capacity.max(1)),
            hook: None,
            log: Arc::new(Mutex::new(TransportLog::default())),
            capture: true,
            in_frame: false,
            frame_started: false,
        }
    }

    /// Keep only the counters, not the events and bytes.
    pub fn without_capture(mut self) -> Self {
        self.capture = false;
        self
    }

    /// Shared handle to the log; stays valid after the transport moves.
    pub fn log(&self) -> Arc<Mutex<TransportLog>> {
        Arc::clone(&self.log)
    }

    fn lock_log(&self) -> MutexGuard<'_, TransportLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_queued(&mut self, transfer: &Transfer) {
        let bytes = transfer.bytes();
        if transfer.dc == DcLine::Command {
            self.in_frame = bytes.first() == Some(&cmd::RAMWR);
            self.frame_started = false;
        }
        let in_frame = self.in_frame && transfer.dc == DcLine::Data;
        let new_frame = in_frame && !self.frame_started;
        self.frame_started |= in_frame;
        let capture = self.capture;

        let mut log = self.lock_log();
        log.transfers += 1;
        log.bytes += bytes.len() as u64;
        if !capture {
            return;
        }
        log.events.push(TransportEvent::Queued {
            descriptor: transfer.descriptor,
            dc: transfer.dc,
            len: bytes.len(),
        });
        if transfer.dc == DcLine::Command {
            log.commands.extend_from_slice(bytes);
        }
        if new_frame {
            log.frames.push(Vec::new());
        }
        if in_frame {
            if let Some(frame) = log.frames.last_mut() {
                frame.extend_from_slice(bytes);
            }
        }
    }
}

impl Transport for LoopbackTransport {
    fn queue(&mut self, transfer: Transfer) -> Result<(), TransportError> {
        if self.in_flight.is_full() {
            return Err(TransportError::QueueFull(self.in_flight.occupied_len()));
        }
        if let Some(hook) = &self.hook {
            hook(transfer.dc);
        }
        self.record_queued(&transfer);
        trace!(
            "loopback queue #{} ({:?}, {} bytes)",
            transfer.descriptor,
            transfer.dc,
            transfer.bytes().len()
        );
        self.in_flight
            .try_push(transfer)
            .map_err(|_| TransportError::QueueFull(self.in_flight.occupied_len()))
    }

    fn wait_result(&mut self) -> Result<Transfer, TransportError> {
        let transfer = self
            .in_flight
            .try_pop()
            .ok_or(TransportError::NothingInFlight)?;
        if self.capture {
            self.lock_log().events.push(TransportEvent::Completed {
                descriptor: transfer.descriptor,
            });
        }
        Ok(transfer)
    }

    fn set_pre_transfer_hook(&mut self, hook: PreTransferHook) {
        self.hook = Some(hook);
    }
}
