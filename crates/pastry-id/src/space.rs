//! Identifier space parameters.
//!
//! A space is a ring of `base^length` positions. Every identifier in the
//! space is written as exactly `length` digits in `[0, base)`, most
//! significant digit first.
//!
//! The base is restricted to powers of two up to 16 so each digit maps onto
//! a whole number of bits and prints as a single hex character. The ring must
//! fit in 128 bits; the canonical Pastry space (`16^32`) uses all of them.

use crate::error::{IdError, Result};

/// Digit base of the canonical Pastry space.
pub const DEFAULT_BASE: u8 = 16;

/// Digit count of the canonical Pastry space.
pub const DEFAULT_LENGTH: usize = 32;

/// Widest ring we can represent.
pub const MAX_BITS: u32 = 128;

/// Shape of an identifier ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdSpace {
    base: u8,
    length: usize,
}

impl IdSpace {
    /// 32 hex digits, 128 bits.
    pub const CANONICAL: Self = Self {
        base: DEFAULT_BASE,
        length: DEFAULT_LENGTH,
    };

    /// Create a space, checking that the ring is representable.
    pub fn new(base: u8, length: usize) -> Result<Self> {
        if !matches!(base, 2 | 4 | 8 | 16) {
            return Err(IdError::InvalidSpace(format!(
                "base {} is not a power of two in 2..=16",
                base
            )));
        }
        if length == 0 {
            return Err(IdError::InvalidSpace("length must be at least one digit".into()));
        }
        let bits = base.trailing_zeros() as usize * length;
        if bits > MAX_BITS as usize {
            return Err(IdError::InvalidSpace(format!(
                "{}^{} needs {} bits, at most {} are supported",
                base, length, bits, MAX_BITS
            )));
        }
        Ok(Self { base, length })
    }

    /// Digit base `B`.
    pub const fn base(&self) -> u8 {
        self.base
    }

    /// Digit count `L`.
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Bits carried by one digit.
    pub const fn bits_per_digit(&self) -> u32 {
        self.base.trailing_zeros()
    }

    /// Total bits in an identifier.
    pub const fn bits(&self) -> u32 {
        self.bits_per_digit() * self.length as u32
    }

    /// Number of positions on the ring, or `None` when it is exactly `2^128`.
    pub const fn ring_size(&self) -> Option<u128> {
        let bits = self.bits();
        if bits >= MAX_BITS {
            None
        } else {
            Some(1u128 << bits)
        }
    }

    /// Largest identifier value in the space.
    pub const fn max_value(&self) -> u128 {
        match self.ring_size() {
            Some(size) => size - 1,
            None => u128::MAX,
        }
    }

    /// Reduce an arbitrary value onto the ring.
    pub const fn reduce(&self, value: u128) -> u128 {
        value & self.max_value()
    }

    /// Distance travelled going clockwise (increasing values) from `from` to `to`.
    pub const fn clockwise(&self, from: u128, to: u128) -> u128 {
        self.reduce(to.wrapping_sub(from))
    }
}

impl Default for IdSpace {
    fn default() -> Self {
        Self::CANONICAL
    }
}

impl std::fmt::Display for IdSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}^{}", self.base, self.length)
    }
}
