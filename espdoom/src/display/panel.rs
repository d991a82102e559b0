//! ILI9341 panel: bring-up sequence and the window header.

use std::thread;
use std::time::Duration;

use espdoom_shared::constants::HEADER_TRANSFERS;
use tracing::{debug, info};

use super::transport::{DcLine, DmaBuffer, PreTransferHook, Transfer, Transport, TransportError};

/// Command bytes used outside the init table.
pub mod cmd {
    /// Column address set
    pub const CASET: u8 = 0x2A;
    /// Page address set
    pub const PASET: u8 = 0x2B;
    /// Memory write
    pub const RAMWR: u8 = 0x2C;
    /// Sleep out
    pub const SLPOUT: u8 = 0x11;
    /// Display on
    pub const DISPON: u8 = 0x29;
}

/// One entry of the init table.
#[derive(Debug, Clone, Copy)]
pub struct InitCommand {
    pub cmd: u8,
    pub data: &'static [u8],
    /// Wait the settle delay after sending.
    pub delay_after: bool,
}

const fn init(cmd: u8, data: &'static [u8]) -> InitCommand {
    InitCommand {
        cmd,
        data,
        delay_after: false,
    }
}

const fn init_delayed(cmd: u8) -> InitCommand {
    InitCommand {
        cmd,
        data: &[],
        delay_after: true,
    }
}

/// Largest parameter list in the init table.
pub const MAX_INIT_DATA: usize = 16;

/// Power, gamma, pixel format (16 bpp) and landscape orientation.
pub const ILI9341_INIT: &[InitCommand] = &[
    init(0xCF, &[0x00, 0x83, 0x30]),
    init(0xED, &[0x64, 0x03, 0x12, 0x81]),
    init(0xE8, &[0x85, 0x01, 0x79]),
    init(0xCB, &[0x39, 0x2C, 0x00, 0x34, 0x02]),
    init(0xF7, &[0x20]),
    init(0xEA, &[0x00, 0x00]),
    init(0xC0, &[0x26]),
    init(0xC1, &[0x11]),
    init(0xC5, &[0x35, 0x3E]),
    init(0xC7, &[0xBE]),
    init(0x36, &[0x28]),
    init(0x3A, &[0x55]),
    init(0xB1, &[0x00, 0x1B]),
    init(0xF2, &[0x08]),
    init(0x26, &[0x01]),
    init(
        0xE0,
        &[
            0x1F, 0x1A, 0x18, 0x0A, 0x0F, 0x06, 0x45, 0x87, 0x32, 0x0A, 0x07, 0x02, 0x07, 0x05,
            0x00,
        ],
    ),
    init(
        0xE1,
        &[
            0x00, 0x25, 0x27, 0x05, 0x10, 0x09, 0x3A, 0x78, 0x4D, 0x05, 0x18, 0x0D, 0x38, 0x3A,
            0x1F,
        ],
    ),
    init(cmd::CASET, &[0x00, 0x00, 0x00, 0xEF]),
    init(cmd::PASET, &[0x00, 0x00, 0x01, 0x3F]),
    init(cmd::RAMWR, &[]),
    init(0xB7, &[0x07]),
    init(0xB6, &[0x0A, 0x82, 0x27, 0x00]),
    init_delayed(cmd::SLPOUT),
    init_delayed(cmd::DISPON),
];

/// GPIOs next to the SPI bus.
pub trait PanelPins: Send {
    fn set_backlight(&mut self, level: bool);
    fn set_reset(&mut self, level: bool);

    /// Hook driving the D/C line, installed on the transport at bring-up.
    fn dc_hook(&mut self) -> Option<PreTransferHook> {
        None
    }
}

/// Pins that go nowhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPins;

impl PanelPins for NoPins {
    fn set_backlight(&mut self, _level: bool) {}
    fn set_reset(&mut self, _level: bool) {}
}

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub spi_clock_hz: u32,
    pub backlight_active_low: bool,
    /// Reset pulse halves and post-command waits.
    pub settle_delay: Duration,
}

/// Light the backlight, pulse reset and send the init table with blocking
/// transfers.
///
/// The D/C hook from `pins` is installed first, so every transfer from here
/// on drives the D/C line.
pub fn bring_up(
    transport: &mut dyn Transport,
    pins: &mut dyn PanelPins,
    config: &PanelConfig,
) -> Result<(), TransportError> {
    info!(
        "Display task starting. ILI9341, speed = {} Hz",
        config.spi_clock_hz
    );
    if let Some(hook) = pins.dc_hook() {
        transport.set_pre_transfer_hook(hook);
    }

    // Backlight first: on some boards it also powers the panel.
    pins.set_backlight(!config.backlight_active_low);

    pins.set_reset(false);
    settle(config.settle_delay);
    pins.set_reset(true);
    settle(config.settle_delay);

    let mut data = DmaBuffer::with_capacity(MAX_INIT_DATA);
    for command in ILI9341_INIT {
        transport.transmit(Transfer::command(0, command.cmd))?;
        if !command.data.is_empty() {
            data.fill_from(command.data);
            data = transport
                .transmit(Transfer::dma(0, data))?
                .into_dma_buffer()
                .unwrap_or_else(|| DmaBuffer::with_capacity(MAX_INIT_DATA));
        }
        if command.delay_after {
            settle(config.settle_delay);
        }
    }
    debug!("Panel initialised ({} commands)", ILI9341_INIT.len());
    Ok(())
}

fn settle(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// The five transfers that open a window and start a memory write.
///
/// Commands alternate with four-byte big-endian start/end coordinates:
/// `CASET x0 x1`, `PASET y0 y1`, `RAMWR`. Descriptors are `0..5`.
pub fn window_header(x: u16, y: u16, width: u16, height: u16) -> [Transfer; HEADER_TRANSFERS] {
    let x_end = x + width.saturating_sub(1);
    let y_end = y + height.saturating_sub(1);
    let [x0h, x0l] = x.to_be_bytes();
    let [x1h, x1l] = x_end.to_be_bytes();
    let [y0h, y0l] = y.to_be_bytes();
    let [y1h, y1l] = y_end.to_be_bytes();
    [
        Transfer::command(0, cmd::CASET),
        Transfer::inline_data(1, &[x0h, x0l, x1h, x1l]),
        Transfer::command(2, cmd::PASET),
        Transfer::inline_data(3, &[y0h, y0l, y1h, y1l]),
        Transfer::command(4, cmd::RAMWR),
    ]
}

/// D/C level of header transfer `n`: even transfers are commands.
pub fn header_dc(n: usize) -> DcLine {
    if n % 2 == 0 { DcLine::Command } else { DcLine::Data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::transport::LoopbackTransport;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingPins {
        calls: Vec<(&'static str, bool)>,
    }

    impl PanelPins for RecordingPins {
        fn set_backlight(&mut self, level: bool) {
            self.calls.push(("backlight", level));
        }
        fn set_reset(&mut self, level: bool) {
            self.calls.push(("reset", level));
        }
    }

    fn config(active_low: bool) -> PanelConfig {
        PanelConfig {
            spi_clock_hz: 40_000_000,
            backlight_active_low: active_low,
            settle_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_window_header_full_screen() {
        let header = window_header(0, 0, 320, 240);
        assert_eq!(header[0].bytes(), &[cmd::CASET]);
        assert_eq!(header[1].bytes(), &[0x00, 0x00, 0x01, 0x3F]);
        assert_eq!(header[2].bytes(), &[cmd::PASET]);
        assert_eq!(header[3].bytes(), &[0x00, 0x00, 0x00, 0xEF]);
        assert_eq!(header[4].bytes(), &[cmd::RAMWR]);
        for (n, transfer) in header.iter().enumerate() {
            assert_eq!(transfer.dc, header_dc(n));
            assert_eq!(transfer.descriptor, n);
        }
    }

    #[test]
    fn test_bring_up_sequence() {
        let mut transport = LoopbackTransport::new(1);
        let log = transport.log();
        let mut pins = RecordingPins::default();
        bring_up(&mut transport, &mut pins, &config(false)).unwrap();

        assert_eq!(
            pins.calls,
            [("backlight", true), ("reset", false), ("reset", true)]
        );
        let log = log.lock().unwrap();
        let expected: Vec<u8> = ILI9341_INIT.iter().map(|c| c.cmd).collect();
        assert_eq!(log.commands, expected);
        let data_transfers = ILI9341_INIT.iter().filter(|c| !c.data.is_empty()).count();
        assert_eq!(log.transfers as usize, ILI9341_INIT.len() + data_transfers);
    }

    #[test]
    fn test_backlight_active_low() {
        let mut transport = LoopbackTransport::new(1);
        let mut pins = RecordingPins::default();
        bring_up(&mut transport, &mut pins, &config(true)).unwrap();
        assert_eq!(pins.calls[0], ("backlight", false));
    }

    struct HookPins(Arc<Mutex<Vec<bool>>>);

    impl PanelPins for HookPins {
        fn set_backlight(&mut self, _level: bool) {}
        fn set_reset(&mut self, _level: bool) {}
        fn dc_hook(&mut self) -> Option<PreTransferHook> {
            let levels = Arc::clone(&self.0);
            Some(Box::new(move |dc| levels.lock().unwrap().push(dc.level())))
        }
    }

    #[test]
    fn test_dc_hook_drives_every_transfer() {
        let levels = Arc::new(Mutex::new(Vec::new()));
        let mut transport = LoopbackTransport::new(1);
        let mut pins = HookPins(Arc::clone(&levels));
        bring_up(&mut transport, &mut pins, &config(false)).unwrap();

        let levels = levels.lock().unwrap();
        // CF + 3 bytes: command low, data high
        assert_eq!(&levels[..2], &[false, true]);
        let commands = levels.iter().filter(|&&level| !level).count();
        assert_eq!(commands, ILI9341_INIT.len());
    }

    #[test]
    fn test_init_table_fits_buffer() {
        assert!(ILI9341_INIT.iter().all(|c| c.data.len() <= MAX_INIT_DATA));
        assert!(ILI9341_INIT.last().unwrap().delay_after);
    }
}
