//! 24.8 fixed-point arithmetic for the sound mixer.
//!
//! The low [`Fixed::FRAC_BITS`] bits hold the fractional part. Playback rates,
//! sample counts and read cursors all share this representation.

use std::fmt;
use std::ops::{Add, AddAssign};

/// A signed 24.8 fixed-point value.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i32);

impl Fixed {
    pub const FRAC_BITS: u32 = 8;
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(1 << Self::FRAC_BITS);

    /// Wrap a raw 24.8 value.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Convert an integer into 24.8.
    #[inline]
    pub const fn from_int(value: i32) -> Self {
        Self(value << Self::FRAC_BITS)
    }

    /// Integer part (floor for non-negative values).
    #[inline]
    pub const fn int_part(self) -> i32 {
        self.0 >> Self::FRAC_BITS
    }

    /// Ratio `source / output` in 24.8, truncating: `(source << 8) / output`.
    ///
    /// Returns [`Fixed::ZERO`] when `output` is zero.
    #[inline]
    pub const fn ratio(source: u32, output: u32) -> Self {
        if output == 0 {
            return Self::ZERO;
        }
        Self((((source as u64) << Self::FRAC_BITS) / output as u64) as i32)
    }
}

impl Add for Fixed {
    type Output = Fixed;

    #[inline]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Fixed) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({}+{}/256)", self.int_part(), self.0 & 0xFF)
    }
}
