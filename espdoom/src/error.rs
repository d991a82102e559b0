//! Recoverable error types and the fail-fast path.
//!
//! Lookups and capacity problems are reported to the caller, who is expected
//! to drop the request. Hardware failures go through [`fatal`].

use std::fmt::Display;

use espdoom_shared::DmxFormatError;
use espdoom_shared::constants::NUM_SLOTS;
use tracing::error;

/// Errors from the sound effect path.
#[derive(Debug, thiserror::Error)]
pub enum SoundError {
    #[error("no sound slot {0} (slots are 0..{n})", n = NUM_SLOTS)]
    NoSlot(i32),

    #[error("sound lump {0} not found")]
    LumpNotFound(String),

    #[error(transparent)]
    Format(#[from] DmxFormatError),

    #[error("sound system not initialised")]
    NotInitialised,
}

impl SoundError {
    /// Value the engine receives in place of a handle.
    pub const SENTINEL: i32 = -1;
}

/// Log and abort the process.
///
/// Used for transport failures, partition mapping failures and display
/// bring-up failures. There is no recovery path for any of them.
#[cold]
pub fn fatal(context: &str, detail: impl Display) -> ! {
    error!("{}: {}", context, detail);
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_slot_message() {
        assert_eq!(
            SoundError::NoSlot(9).to_string(),
            "no sound slot 9 (slots are 0..8)"
        );
    }

    #[test]
    fn test_format_error_converts() {
        fn parse() -> Result<(), SoundError> {
            Err(DmxFormatError::UnsupportedFormat(2))?;
            Ok(())
        }
        assert!(matches!(
            parse(),
            Err(SoundError::Format(DmxFormatError::UnsupportedFormat(2)))
        ));
    }
}
