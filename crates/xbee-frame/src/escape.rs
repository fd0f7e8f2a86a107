//! Escaped API mode byte stuffing.
//!
//! Reserved values inside length, payload and checksum are sent as
//! `ESCAPE, value ^ 0x20`. The start delimiter that opens a frame is never
//! stuffed, so in escaped mode a raw `0x7E` on the wire always marks a frame
//! boundary.

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Frame start delimiter.
pub const START: u8 = 0x7E;
/// Escape marker.
pub const ESCAPE: u8 = 0x7D;
/// Software flow control: resume.
pub const XON: u8 = 0x11;
/// Software flow control: pause.
pub const XOFF: u8 = 0x13;
/// Value XOR-ed into an escaped byte.
pub const ESCAPE_XOR: u8 = 0x20;

/// Whether the link stuffs reserved bytes (`ATAP2`) or not (`ATAP1`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EscapeMode {
    /// API mode without escaping (`AP=1`).
    #[default]
    Unescaped,
    /// API mode with escaped reserved bytes (`AP=2`).
    Escaped,
}

impl EscapeMode {
    /// True for [`EscapeMode::Escaped`].
    pub fn is_escaped(self) -> bool {
        matches!(self, EscapeMode::Escaped)
    }
}

/// Returns true if `byte` must be stuffed in escaped mode.
pub fn is_reserved(byte: u8) -> bool {
    matches!(byte, START | ESCAPE | XON | XOFF)
}

/// Append `src` to `dst`, stuffing every reserved byte.
pub fn stuff(src: &[u8], dst: &mut BytesMut) {
    let extra = src.iter().filter(|&&b| is_reserved(b)).count();
    dst.reserve(src.len() + extra);
    for &byte in src {
        if is_reserved(byte) {
            dst.put_u8(ESCAPE);
            dst.put_u8(byte ^ ESCAPE_XOR);
        } else {
            dst.put_u8(byte);
        }
    }
}

/// Append `src` to `dst`, reversing [`stuff`].
///
/// Fails if `src` ends with an escape byte that has no successor.
pub fn unstuff(src: &[u8], dst: &mut BytesMut) -> Result<()> {
    dst.reserve(src.len());
    let mut bytes = src.iter();
    while let Some(&byte) = bytes.next() {
        if byte == ESCAPE {
            let &next = bytes.next().ok_or(FrameError::DanglingEscape)?;
            dst.put_u8(next ^ ESCAPE_XOR);
        } else {
            dst.put_u8(byte);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stuffs_each_reserved_byte() {
        let mut out = BytesMut::new();
        stuff(&[0x7E, 0x7D, 0x11, 0x13], &mut out);
        assert_eq!(
            out.as_ref(),
            &[0x7D, 0x5E, 0x7D, 0x5D, 0x7D, 0x31, 0x7D, 0x33]
        );
    }

    #[test]
    fn leaves_ordinary_bytes_alone() {
        let mut out = BytesMut::new();
        stuff(&[0x00, 0x20, 0x5E, 0xFF], &mut out);
        assert_eq!(out.as_ref(), &[0x00, 0x20, 0x5E, 0xFF]);
    }

    #[test]
    fn unstuff_reverses_stuff_for_every_byte_value() {
        let all: Vec<u8> = (0..=255u8).chain([0x7E, 0x7D, 0x11, 0x13, 0x7D, 0x7D]).collect();
        let mut stuffed = BytesMut::new();
        stuff(&all, &mut stuffed);

        let mut restored = BytesMut::new();
        unstuff(&stuffed, &mut restored).unwrap();
        assert_eq!(restored.as_ref(), all.as_slice());
    }

    #[test]
    fn stuffed_output_contains_no_raw_reserved_bytes_but_escapes() {
        let mut stuffed = BytesMut::new();
        stuff(&[0x7E, 0x11, 0x13, 0x7D, 0x42], &mut stuffed);
        let mut iter = stuffed.iter();
        while let Some(&b) = iter.next() {
            assert!(b == ESCAPE || !is_reserved(b));
            if b == ESCAPE {
                let next = *iter.next().unwrap();
                assert!(is_reserved(next ^ ESCAPE_XOR));
            }
        }
    }

    #[test]
    fn dangling_escape_is_rejected() {
        let mut out = BytesMut::new();
        let err = unstuff(&[0x01, 0x7D], &mut out).unwrap_err();
        assert!(matches!(err, FrameError::DanglingEscape));
    }

    #[test]
    fn default_mode_is_unescaped() {
        assert_eq!(EscapeMode::default(), EscapeMode::Unescaped);
        assert!(EscapeMode::Escaped.is_escaped());
    }
}
