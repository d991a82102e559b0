//! Display path
//!
//! Indexed 8-bit frames from the engine become RGB565 on an ILI9341 panel:
//!
//! ```text
//! submit_frame ──► [pending] ──frame-ready──► display task
//!                                              ├─ header (CASET, PASET, RAMWR)
//!                                              └─ chunks ──palette──► Transport
//! ```

pub mod palette;
pub mod panel;
pub mod pipeline;
pub mod signal;
pub mod transport;

pub use palette::Palette;
pub use panel::{NoPins, PanelConfig, PanelPins};
pub use pipeline::{DisplayPipeline, PipelineConfig};
pub use signal::BinarySignal;
pub use transport::{DcLine, DmaBuffer, LoopbackTransport, Transfer, Transport, TransportError};
