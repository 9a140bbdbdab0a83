//! Variable identifiers.
//!
//! A [`Key`] is an opaque 64-bit identifier. Symbol keys pack a character tag
//! into the top byte and an index into the remaining 56 bits, so `symbol('x', 3)`
//! displays as `x3`. A [`DiscreteKey`] pairs a key with the cardinality of its
//! finite domain.

use std::fmt;

use crate::errors::HybridError;

const CHAR_BITS: u32 = 8;
const INDEX_BITS: u32 = 64 - CHAR_BITS;
const INDEX_MASK: u64 = (1u64 << INDEX_BITS) - 1;

/// A unique identifier for a random variable.
///
/// Key implements Ord/PartialOrd for stable, deterministic iteration.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Key(pub u64);

impl Key {
    /// Builds a symbol key from a character tag and an index.
    ///
    /// Tags must be ASCII and indices must fit in 56 bits; use
    /// [`Key::try_symbol`] for untrusted input.
    pub fn symbol(tag: char, index: u64) -> Self {
        debug_assert!(tag.is_ascii(), "symbol tag {:?} is not ASCII", tag);
        debug_assert!(index <= INDEX_MASK, "symbol index {} exceeds 56 bits", index);
        let tag = (tag as u32 & 0xff) as u64;
        Key((tag << INDEX_BITS) | (index & INDEX_MASK))
    }

    /// Like [`Key::symbol`] but rejects tags and indices that would alias.
    pub fn try_symbol(tag: char, index: u64) -> Result<Self, HybridError> {
        if !tag.is_ascii() {
            return Err(HybridError::ValidationError(format!(
                "symbol tag {:?} is not ASCII",
                tag
            )));
        }
        if index > INDEX_MASK {
            return Err(HybridError::ValidationError(format!(
                "symbol index {} exceeds 56 bits",
                index
            )));
        }
        Ok(Self::symbol(tag, index))
    }

    /// Returns the character tag if this key was built by [`Key::symbol`].
    pub fn tag(self) -> Option<char> {
        let tag = (self.0 >> INDEX_BITS) as u8;
        if tag.is_ascii_alphabetic() {
            Some(tag as char)
        } else {
            None
        }
    }

    /// Returns the index part of a symbol key.
    pub fn index(self) -> u64 {
        self.0 & INDEX_MASK
    }
}

impl From<u64> for Key {
    fn from(raw: u64) -> Self {
        Key(raw)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Some(tag) => write!(f, "{}{}", tag, self.index()),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Shorthand for [`Key::symbol`].
pub fn symbol(tag: char, index: u64) -> Key {
    Key::symbol(tag, index)
}

/// A discrete variable: its key and the size of its finite domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct DiscreteKey {
    pub key: Key,
    pub cardinality: usize,
}

impl DiscreteKey {
    pub fn new(key: Key, cardinality: usize) -> Self {
        Self { key, cardinality }
    }
}

impl From<(Key, usize)> for DiscreteKey {
    fn from((key, cardinality): (Key, usize)) -> Self {
        Self { key, cardinality }
    }
}

impl fmt::Display for DiscreteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.key, self.cardinality)
    }
}
