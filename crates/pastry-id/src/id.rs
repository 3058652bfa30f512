//! Node identifiers.
//!
//! A [`NodeId`] is a fixed-length digit string in an [`IdSpace`]. It is stored
//! as the ring position it denotes, so prefix and distance queries reduce to
//! integer arithmetic.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::{IdError, Result};
use crate::space::{IdSpace, MAX_BITS};

/// Position of a node on the identifier ring.
///
/// Ordering is numeric (non-circular). Identifiers from different spaces are
/// never equal, but comparing them is only meaningful within one space.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId {
    value: u128,
    space: IdSpace,
}

impl NodeId {
    /// Parse a string of hex digit characters, one per digit.
    pub fn parse(text: &str, space: IdSpace) -> Result<Self> {
        let actual = text.chars().count();
        if actual != space.length() {
            return Err(IdError::InvalidLength {
                expected: space.length(),
                actual,
            });
        }

        let digits = text
            .chars()
            .enumerate()
            .map(|(position, character)| {
                character
                    .to_digit(16)
                    .ok_or(IdError::InvalidCharacter { position, character })
            })
            .collect::<Result<Vec<u32>>>()?;

        Self::from_digits(&digits, space)
    }

    /// Build from individual digit values, most significant first.
    pub fn from_digits<D>(digits: &[D], space: IdSpace) -> Result<Self>
    where
        D: Copy + Into<u32>,
    {
        if digits.len() != space.length() {
            return Err(IdError::InvalidLength {
                expected: space.length(),
                actual: digits.len(),
            });
        }

        let shift = space.bits_per_digit();
        let mut value = 0u128;
        for (position, &digit) in digits.iter().enumerate() {
            let digit = digit.into();
            if digit >= space.base() as u32 {
                return Err(IdError::InvalidDigit {
                    position,
                    digit,
                    base: space.base(),
                });
            }
            value = (value << shift) | digit as u128;
        }

        Ok(Self { value, space })
    }

    /// Place an arbitrary value on the ring (reduced modulo the ring size).
    pub const fn from_value(value: u128, space: IdSpace) -> Self {
        Self {
            value: space.reduce(value),
            space,
        }
    }

    /// Derive an identifier by hashing arbitrary bytes (e.g. a public key).
    ///
    /// Takes the leading bits of the blake3 digest.
    pub fn hash(data: &[u8], space: IdSpace) -> Self {
        let digest = blake3::hash(data);
        let mut head = [0u8; 16];
        head.copy_from_slice(&digest.as_bytes()[..16]);
        let wide = u128::from_be_bytes(head);
        let value = wide >> (128 - space.bits());
        Self { value, space }
    }

    /// The space this identifier lives in.
    pub const fn space(&self) -> IdSpace {
        self.space
    }

    /// Ring position.
    pub const fn value(&self) -> u128 {
        self.value
    }

    /// Number of digits.
    pub const fn len(&self) -> usize {
        self.space.length()
    }

    /// Always false; identifiers have at least one digit.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Digit at `index`, or `None` past the end.
    pub fn digit(&self, index: usize) -> Option<u8> {
        if index >= self.len() {
            return None;
        }
        let bpd = self.space.bits_per_digit();
        let shift = bpd * (self.len() - 1 - index) as u32;
        let mask = (self.space.base() - 1) as u128;
        Some(((self.value >> shift) & mask) as u8)
    }

    /// All digits, most significant first.
    pub fn digits(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len()).filter_map(move |i| self.digit(i))
    }

    /// Count of leading digits shared with `other`. Equal ids share all `L`.
    ///
    /// Identifiers from different spaces share no prefix.
    pub fn shared_prefix_length(&self, other: &NodeId) -> usize {
        if self.space != other.space {
            return 0;
        }
        let diff = self.value ^ other.value;
        if diff == 0 {
            return self.len();
        }
        let unused = MAX_BITS - self.space.bits();
        let equal_bits = diff.leading_zeros().saturating_sub(unused);
        (equal_bits / self.space.bits_per_digit()) as usize
    }

    /// Distance walking clockwise (towards larger values, wrapping) to `other`.
    pub const fn clockwise_distance(&self, other: &NodeId) -> u128 {
        self.space.clockwise(self.value, other.value)
    }

    /// Shorter of the clockwise and counter-clockwise distances.
    pub fn circular_distance(&self, other: &NodeId) -> u128 {
        let forward = self.clockwise_distance(other);
        let backward = other.clockwise_distance(self);
        forward.min(backward)
    }

    /// Lowercase hex rendering, one character per digit.
    pub fn to_hex(&self) -> String {
        self.digits()
            .map(|d| char::from_digit(d as u32, 16).unwrap_or('?'))
            .collect()
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.space.length().cmp(&other.space.length()))
            .then_with(|| self.space.base().cmp(&other.space.base()))
    }
}

impl FromStr for NodeId {
    type Err = IdError;

    /// Parses in the canonical 128-bit space.
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, IdSpace::CANONICAL)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}
