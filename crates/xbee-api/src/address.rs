//! Device address value types.
//!
//! Both are big-endian on the wire. [`Address64`] is kept as two 32-bit
//! halves, matching how the module reports it (`ATSH` / `ATSL`) and keeping
//! comparisons free of 64-bit arithmetic.

use std::fmt;
use std::str::FromStr;

use crate::error::{ApiError, Result};

/// 16-bit network address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address16(u16);

impl Address16 {
    /// Wire size in bytes.
    pub const SIZE: usize = 2;
    /// Broadcast to every node.
    pub const BROADCAST: Self = Self(0xFFFF);
    /// Network address not known; the module resolves it from the 64-bit address.
    pub const UNKNOWN: Self = Self(0xFFFE);

    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    /// Read from the first two bytes of `bytes`.
    pub fn read(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [hi, lo, ..] => Ok(Self(u16::from_be_bytes([*hi, *lo]))),
            _ => Err(ApiError::InsufficientBytes {
                expected: Self::SIZE,
                actual: bytes.len(),
            }),
        }
    }

    pub fn write(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }
}

impl From<u16> for Address16 {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for Address16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

impl FromStr for Address16 {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = strip_hex_prefix(s);
        if digits.is_empty() || digits.len() > 4 {
            return Err(ApiError::InvalidAddress(s.to_string()));
        }
        u16::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| ApiError::InvalidAddress(s.to_string()))
    }
}

/// 64-bit IEEE (serial number) address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address64 {
    high: u32,
    low: u32,
}

impl Address64 {
    /// Wire size in bytes.
    pub const SIZE: usize = 8;
    /// Broadcast to every node.
    pub const BROADCAST: Self = Self::from_halves(0xFFFF_FFFF, 0xFFFF_FFFF);
    /// Shortcut addressing the network coordinator.
    pub const COORDINATOR: Self = Self::from_halves(0, 0);

    pub const fn from_halves(high: u32, low: u32) -> Self {
        Self { high, low }
    }

    pub const fn new(value: u64) -> Self {
        Self::from_halves((value >> 32) as u32, value as u32)
    }

    /// Upper half (`ATSH`).
    pub const fn high(self) -> u32 {
        self.high
    }

    /// Lower half (`ATSL`).
    pub const fn low(self) -> u32 {
        self.low
    }

    pub const fn value(self) -> u64 {
        ((self.high as u64) << 32) | self.low as u64
    }

    /// Read from the first eight bytes of `bytes`.
    pub fn read(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [a, b, c, d, e, f, g, h, ..] => Ok(Self::from_halves(
                u32::from_be_bytes([*a, *b, *c, *d]),
                u32::from_be_bytes([*e, *f, *g, *h]),
            )),
            _ => Err(ApiError::InsufficientBytes {
                expected: Self::SIZE,
                actual: bytes.len(),
            }),
        }
    }

    pub fn write(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.high.to_be_bytes());
        out[4..].copy_from_slice(&self.low.to_be_bytes());
        out
    }

    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }

    pub fn is_coordinator(self) -> bool {
        self == Self::COORDINATOR
    }
}

impl From<u64> for Address64 {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Address64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}{:08X}", self.high, self.low)
    }
}

impl FromStr for Address64 {
    type Err = ApiError;

    /// Parses 1 to 16 hex digits, optionally `0x`-prefixed and with `:` or
    /// space separators (`0013A200:40A1B2C3`).
    fn from_str(s: &str) -> Result<Self> {
        let digits: String = strip_hex_prefix(s)
            .chars()
            .filter(|c| *c != ':' && *c != ' ')
            .collect();
        if digits.is_empty() || digits.len() > 16 {
            return Err(ApiError::InvalidAddress(s.to_string()));
        }
        u64::from_str_radix(&digits, 16)
            .map(Self::new)
            .map_err(|_| ApiError::InvalidAddress(s.to_string()))
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}
