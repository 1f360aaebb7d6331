//! Size-with-suffix parsing (`"64M"`, `"1k"`, `"4096"`).
//!
//! Lowercase suffixes are decimal (powers of 1000), uppercase suffixes are
//! binary (powers of 1024). `b` and `B` both mean a single byte.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while parsing a size expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SizeError {
    #[error("empty size")]
    EmptyInput,

    #[error("invalid size multiplier: {0:?}")]
    UnknownSuffix(char),

    #[error("invalid size: {0:?}")]
    InvalidNumber(String),

    #[error("size {number} x {multiplier} does not fit in 64 bits")]
    SizeOverflow { number: u64, multiplier: u64 },

    #[error("size must be greater than zero")]
    ZeroSize,
}

const KIB: u64 = 1024;
const KB: u64 = 1000;

fn multiplier(suffix: char) -> Option<u64> {
    let mult = match suffix {
        'b' | 'B' => 1,
        'k' => KB,
        'm' => KB.pow(2),
        'g' => KB.pow(3),
        't' => KB.pow(4),
        'p' => KB.pow(5),
        'K' => KIB,
        'M' => KIB.pow(2),
        'G' => KIB.pow(3),
        'T' => KIB.pow(4),
        'P' => KIB.pow(5),
        _ => return None,
    };
    Some(mult)
}

/// Parses a size expression into a positive byte count.
///
/// The grammar is `<digits>[suffix]`; a missing suffix means bytes.
///
/// ```
/// use splittar::size::parse_size;
///
/// assert_eq!(parse_size("2M").unwrap(), 2 * 1024 * 1024);
/// assert_eq!(parse_size("2m").unwrap(), 2_000_000);
/// assert!(parse_size("5x").is_err());
/// ```
pub fn parse_size(input: &str) -> Result<u64, SizeError> {
    let last = input.chars().next_back().ok_or(SizeError::EmptyInput)?;

    let (digits, mult) = if last.is_ascii_digit() {
        (input, 1)
    } else {
        let mult = multiplier(last).ok_or(SizeError::UnknownSuffix(last))?;
        (&input[..input.len() - last.len_utf8()], mult)
    };

    // u64::from_str would also accept a leading '+'.
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SizeError::InvalidNumber(input.to_string()));
    }
    let number: u64 = digits
        .parse()
        .map_err(|_| SizeError::InvalidNumber(input.to_string()))?;

    let size = number
        .checked_mul(mult)
        .ok_or(SizeError::SizeOverflow { number, multiplier: mult })?;

    if size == 0 {
        return Err(SizeError::ZeroSize);
    }
    Ok(size)
}

/// A positive byte count parsed from a size expression.
///
/// Usable directly as a clap value parser through its `FromStr` impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(u64);

impl ByteSize {
    pub fn new(bytes: u64) -> Option<Self> {
        (bytes > 0).then_some(Self(bytes))
    }

    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = SizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_size(s).map(Self)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (suffix, unit) in [('P', KIB.pow(5)), ('T', KIB.pow(4)), ('G', KIB.pow(3)), ('M', KIB.pow(2)), ('K', KIB)] {
            if self.0 >= unit && self.0 % unit == 0 {
                return write!(f, "{}{}", self.0 / unit, suffix);
            }
        }
        write!(f, "{}", self.0)
    }
}
