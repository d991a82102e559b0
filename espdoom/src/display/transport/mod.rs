//! Asynchronous transfer contract between the display task and the bus.
//!
//! A [`Transfer`] is one transaction: a D/C level plus either a few inline
//! bytes or a DMA buffer. The transport owns a transfer from
//! [`Transport::queue`] until it hands it back through
//! [`Transport::wait_result`], which returns transfers in submission order.

mod loopback;

pub use loopback::{LoopbackTransport, TransportEvent, TransportLog};

/// Level of the data/command select line during a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcLine {
    /// D/C low: the bytes are a command.
    Command,
    /// D/C high: the bytes are parameters or pixel data.
    Data,
}

impl DcLine {
    pub fn level(self) -> bool {
        matches!(self, DcLine::Data)
    }
}

/// Longest payload carried inline in a transfer descriptor.
pub const INLINE_CAPACITY: usize = 4;

/// Fixed-capacity transmit buffer; `len` bytes of it are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaBuffer {
    bytes: Box<[u8]>,
    len: usize,
}

impl DmaBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Copy `data` in, truncated to capacity.
    pub fn fill_from(&mut self, data: &[u8]) {
        let len = data.len().min(self.bytes.len());
        self.bytes[..len].copy_from_slice(&data[..len]);
        self.len = len;
    }

    /// Whole backing storage, for writers that set the length afterwards.
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.bytes.len());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Inline { bytes: [u8; INLINE_CAPACITY], len: u8 },
    Dma(DmaBuffer),
}

/// One bus transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Caller-chosen tag, returned unchanged on completion.
    pub descriptor: usize,
    pub dc: DcLine,
    pub payload: Payload,
}

impl Transfer {
    /// A single command byte.
    pub fn command(descriptor: usize, command: u8) -> Self {
        Self::inline(descriptor, DcLine::Command, &[command])
    }

    /// Up to four parameter bytes carried inline.
    pub fn inline_data(descriptor: usize, data: &[u8]) -> Self {
        Self::inline(descriptor, DcLine::Data, data)
    }

    /// Data bytes from a DMA buffer.
    pub fn dma(descriptor: usize, buffer: DmaBuffer) -> Self {
        Self {
            descriptor,
            dc: DcLine::Data,
            payload: Payload::Dma(buffer),
        }
    }

    fn inline(descriptor: usize, dc: DcLine, data: &[u8]) -> Self {
        let len = data.len().min(INLINE_CAPACITY);
        let mut bytes = [0; INLINE_CAPACITY];
        bytes[..len].copy_from_slice(&data[..len]);
        Self {
            descriptor,
            dc,
            payload: Payload::Inline {
                bytes,
                len: len as u8,
            },
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.payload {
            Payload::Inline { bytes, len } => &bytes[..*len as usize],
            Payload::Dma(buffer) => buffer.as_bytes(),
        }
    }

    pub fn into_dma_buffer(self) -> Option<DmaBuffer> {
        match self.payload {
            Payload::Dma(buffer) => Some(buffer),
            Payload::Inline { .. } => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transfer queue full ({0} in flight)")]
    QueueFull(usize),

    #[error("no transfer in flight")]
    NothingInFlight,

    #[error("bus error: {0}")]
    Bus(String),
}

/// Called with the D/C level right before each transfer goes on the wire.
pub type PreTransferHook = Box<dyn Fn(DcLine) + Send + Sync>;

/// An asynchronous, in-order transfer queue.
pub trait Transport: Send {
    /// Start `transfer`. Ownership passes to the transport.
    fn queue(&mut self, transfer: Transfer) -> Result<(), TransportError>;

    /// Block until the oldest queued transfer completes and return it.
    fn wait_result(&mut self) -> Result<Transfer, TransportError>;

    /// Install the hook that drives the D/C line.
    fn set_pre_transfer_hook(&mut self, hook: PreTransferHook);

    /// Queue one transfer and wait for it. Only valid with nothing in flight.
    fn transmit(&mut self, transfer: Transfer) -> Result<Transfer, TransportError> {
        self.queue(transfer)?;
        self.wait_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_payloads() {
        let cmd = Transfer::command(0, 0x2A);
        assert_eq!(cmd.dc, DcLine::Command);
        assert_eq!(cmd.bytes(), &[0x2A]);

        let data = Transfer::inline_data(1, &[0, 0, 1, 0x3F]);
        assert_eq!(data.dc, DcLine::Data);
        assert_eq!(data.bytes(), &[0, 0, 1, 0x3F]);
        assert!(data.into_dma_buffer().is_none());
    }

    #[test]
    fn test_dma_buffer_len() {
        let mut buffer = DmaBuffer::with_capacity(4);
        buffer.fill_from(&[1, 2, 3, 4, 5]);
        assert_eq!(buffer.as_bytes(), &[1, 2, 3, 4]);
        buffer.set_len(2);
        let transfer = Transfer::dma(3, buffer);
        assert_eq!(transfer.bytes(), &[1, 2]);
        assert_eq!(transfer.into_dma_buffer().unwrap().capacity(), 4);
    }

    #[test]
    fn test_dc_levels() {
        assert!(!DcLine::Command.level());
        assert!(DcLine::Data.level());
    }
}
