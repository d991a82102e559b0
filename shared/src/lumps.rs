//! Lump naming conventions used when looking up engine resources.

/// Name of the palette lump.
pub const PLAYPAL: &str = "PLAYPAL";

/// Maximum length of a lump name.
pub const LUMP_NAME_LEN: usize = 8;

/// Lump name holding the DMX record for a sound effect: `DS` + upper-cased name.
///
/// Names longer than a lump allows are truncated to [`LUMP_NAME_LEN`]
/// characters.
pub fn sound_lump_name(sfx_name: &str) -> String {
    "DS".chars()
        .chain(sfx_name.chars().map(|c| c.to_ascii_uppercase()))
        .take(LUMP_NAME_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_lump_name() {
        assert_eq!(sound_lump_name("pistol"), "DSPISTOL");
        assert_eq!(sound_lump_name("oof"), "DSOOF");
        assert_eq!(sound_lump_name("DSx"), "DSDSX");
    }

    #[test]
    fn test_sound_lump_name_truncates() {
        assert_eq!(sound_lump_name("bfgexplode"), "DSBFGEXP");
    }

    #[test]
    fn test_sound_lump_name_non_ascii() {
        // The 8th character straddles the 8-byte boundary
        assert_eq!(sound_lump_name("abcdeé"), "DSABCDEé");
        assert_eq!(sound_lump_name("ééééééé"), "DSéééééé");
    }
}
