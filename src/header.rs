//! Stream header and properties parsing.
//!
//! A classic `.lzma` stream opens with 13 bytes:
//!
//! | Offset | Size | Field                                            |
//! |--------|------|--------------------------------------------------|
//! | 0      | 1    | properties byte, `(pb * 5 + lp) * 9 + lc`        |
//! | 1      | 4    | dictionary size, little endian                   |
//! | 5      | 8    | uncompressed size, little endian, `!0` = unknown |
//!
//! LZMA2 containers carry none of this; they encode the dictionary size in
//! a single byte ([`dict_size_from_props`]) and per-chunk properties.

use std::io;
use std::io::Read;

use crate::error::{LzmaError, Result};

/// Smallest dictionary the format permits; headers declaring less are
/// rounded up.
pub(crate) const DICT_SIZE_MIN: u32 = 4096;

const STREAM_HEADER_LEN: usize = 13;

/// Literal-context bits, literal-position bits, and position bits.
///
/// `lc <= 8`, `lp <= 4`, `pb <= 4`. The trio packs into a single byte as
/// `(pb * 5 + lp) * 9 + lc`, so any byte below 225 is a valid encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaProps {
    /// High bits of the previous byte feeding literal contexts.
    pub lc: u32,
    /// Low position bits feeding literal contexts.
    pub lp: u32,
    /// Low position bits feeding match/literal choice contexts.
    pub pb: u32,
}

impl LzmaProps {
    /// Unpacks a properties byte.
    ///
    /// # Errors
    ///
    /// [`LzmaError::IncorrectProperties`] for bytes `>= 225`.
    pub fn from_byte(encoded: u8) -> Result<Self> {
        if encoded >= 225 {
            return Err(LzmaError::IncorrectProperties(encoded));
        }
        let mut d = u32::from(encoded);
        let lc = d % 9;
        d /= 9;
        Ok(Self { lc, lp: d % 5, pb: d / 5 })
    }

    /// Re-packs into the single-byte encoding.
    pub fn to_byte(self) -> u8 {
        ((self.pb * 5 + self.lp) * 9 + self.lc) as u8
    }
}

/// Parsed 13-byte stream header.
pub(crate) struct StreamHeader {
    pub(crate) props: LzmaProps,
    pub(crate) dict_size: u32,
    /// `None` when the header declares the size unknown; the stream must
    /// then end with the in-band marker.
    pub(crate) unpack_size: Option<u64>,
}

pub(crate) fn read_stream_header<R: Read>(input: &mut R) -> Result<StreamHeader> {
    let mut raw = [0u8; STREAM_HEADER_LEN];
    read_exact_or_corrupted(input, &mut raw)?;
    let props = LzmaProps::from_byte(raw[0])?;
    let dict_size =
        u32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]).max(DICT_SIZE_MIN);
    let unpack_size = normalize_unpack_size(Some(u64::from_le_bytes([
        raw[5], raw[6], raw[7], raw[8], raw[9], raw[10], raw[11], raw[12],
    ])));
    Ok(StreamHeader { props, dict_size, unpack_size })
}

/// The on-wire convention spells "unknown" as all-ones; fold it into
/// `None` so the rest of the decoder has one representation.
pub(crate) fn normalize_unpack_size(unpack_size: Option<u64>) -> Option<u64> {
    match unpack_size {
        Some(u64::MAX) => None,
        other => other,
    }
}

/// Decodes the one-byte LZMA2 dictionary size: `2 | (b & 1)` shifted by
/// `b / 2 + 11`, with 40 spelling the 4 GiB maximum.
pub(crate) fn dict_size_from_props(encoded: u8) -> Result<u32> {
    if encoded > 40 {
        return Err(LzmaError::IncorrectProperties(encoded));
    }
    if encoded == 40 {
        return Ok(u32::MAX);
    }
    let b = u32::from(encoded);
    Ok((2 | (b & 1)) << (b / 2 + 11))
}

/// `read_exact` that reports truncation as [`LzmaError::Corrupted`]:
/// running out of bytes mid-header is a stream defect, not an IO fault.
pub(crate) fn read_exact_or_corrupted<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<()> {
    match input.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(LzmaError::Corrupted),
        Err(e) => Err(LzmaError::Io(e)),
    }
}

pub(crate) fn read_u8<R: Read>(input: &mut R) -> Result<u8> {
    let mut b = [0u8; 1];
    read_exact_or_corrupted(input, &mut b)?;
    Ok(b[0])
}
