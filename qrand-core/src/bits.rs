//! Owned bit strings
//!
//! Entropy travels through the crate as `BitString`s: ordered bits in
//! generation order, most significant bit first when read as an integer.

use std::fmt;

/// An ordered sequence of random bits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitString {
    bits: Vec<bool>,
}

impl BitString {
    /// Create an empty bit string
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bit string with room for `n` bits
    pub fn with_capacity(n: usize) -> Self {
        Self {
            bits: Vec::with_capacity(n),
        }
    }

    /// Expand bytes into bits, most significant bit of each byte first
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let bits = bytes
            .iter()
            .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1))
            .collect();
        Self { bits }
    }

    /// Parse a string of `0` and `1` characters
    pub fn parse(s: &str) -> Option<Self> {
        s.chars()
            .map(|c| match c {
                '0' => Some(false),
                '1' => Some(true),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(|bits| Self { bits })
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    /// Keep only the first `n` bits
    pub fn truncate(&mut self, n: usize) {
        self.bits.truncate(n);
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }

    /// Interpret the bits as a big-endian unsigned integer
    ///
    /// Returns `None` when the string is longer than 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.bits.len() > 64 {
            return None;
        }
        Some(
            self.bits
                .iter()
                .fold(0u64, |acc, &bit| (acc << 1) | u64::from(bit)),
        )
    }

    /// Pack the bits into bytes, padding the final byte with zeros
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, &bit)| acc | (u8::from(bit) << (7 - i)))
            })
            .collect()
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.bits {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromIterator<bool> for BitString {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

impl Extend<bool> for BitString {
    fn extend<I: IntoIterator<Item = bool>>(&mut self, iter: I) {
        self.bits.extend(iter);
    }
}

impl IntoIterator for BitString {
    type Item = bool;
    type IntoIter = std::vec::IntoIter<bool>;

    fn into_iter(self) -> Self::IntoIter {
        self.bits.into_iter()
    }
}
