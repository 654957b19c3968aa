//! Error types for LZMA and LZMA2 decoding.
//!
//! This module provides the [`LzmaError`] type which covers all possible
//! errors that can occur while parsing stream headers or decoding the
//! compressed bitstream.
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Framing | [`Corrupted`], [`UnexpectedChunkCode`] | Headers or chunk framing are malformed |
//! | Parameters | [`IncorrectProperties`], [`DictSizeOutOfRange`] | Stream parameters are invalid |
//! | Bitstream | [`DataError`], [`IncompleteStream`] | The decoded bitstream violates the format |
//! | I/O | [`Io`] | Errors from the underlying byte source |
//!
//! ## Example
//!
//! ```rust,ignore
//! use lzma_stream::{LzmaReader, LzmaError};
//!
//! match LzmaReader::new(input) {
//!     Ok(reader) => { /* decode */ }
//!     Err(LzmaError::IncorrectProperties(byte)) => {
//!         eprintln!("not an LZMA stream (properties byte {byte:#04x})");
//!     }
//!     Err(e) => eprintln!("error: {}", e),
//! }
//! ```
//!
//! [`Corrupted`]: LzmaError::Corrupted
//! [`UnexpectedChunkCode`]: LzmaError::UnexpectedChunkCode
//! [`IncorrectProperties`]: LzmaError::IncorrectProperties
//! [`DictSizeOutOfRange`]: LzmaError::DictSizeOutOfRange
//! [`DataError`]: LzmaError::DataError
//! [`IncompleteStream`]: LzmaError::IncompleteStream
//! [`Io`]: LzmaError::Io

use std::fmt;
use std::io;

/// Error type for LZMA decoding operations.
///
/// Every error is fatal for the decode call that produced it: the decoder
/// performs no resynchronization and no retries. Bytes already delivered to
/// the caller remain valid. The distinction between a clean end of stream
/// (`Ok(0)` from a read), a stream that ended before producing its declared
/// length ([`IncompleteStream`]), and a corrupt stream ([`DataError`] and
/// friends) is part of the decoder contract.
///
/// [`IncompleteStream`]: LzmaError::IncompleteStream
/// [`DataError`]: LzmaError::DataError
#[derive(Debug)]
pub enum LzmaError {
    /// A stream header, chunk header, or the range-coder prologue is
    /// malformed, or the input ended mid-stream.
    ///
    /// LZMA streams start with a 13-byte header (properties byte,
    /// little-endian dictionary size, little-endian unpacked size) followed
    /// by a 5-byte range-coder prologue. LZMA2 chunk headers are 1 to 6
    /// bytes. Running out of input inside any of these, or inside a chunk
    /// payload, is corruption, not an I/O condition.
    Corrupted,

    /// The properties byte does not encode a valid lc/lp/pb combination.
    ///
    /// The byte must satisfy `b < 9 * 5 * 5 = 225`. For the LZMA2
    /// dictionary-size byte the valid range is `0..=40`. The offending byte
    /// is carried for diagnostics.
    IncorrectProperties(u8),

    /// The declared dictionary size exceeds the format maximum of
    /// `u32::MAX` bytes.
    DictSizeOutOfRange(u64),

    /// An LZMA2 control byte does not decode to a known chunk kind.
    ///
    /// Valid control bytes are `0x00` (end of stream), `0x01`/`0x02`
    /// (uncompressed chunks), and `0x80..=0xFF` (LZMA chunks). Everything in
    /// `0x03..=0x7F` is reserved.
    UnexpectedChunkCode(u8),

    /// The bitstream decoded to an operation the format forbids at this
    /// point.
    ///
    /// Covers end markers at the wrong time, operations decoded after the
    /// declared size was exhausted, back-references beyond the window fill,
    /// matches overrunning the declared size, and LZMA2 chunks whose
    /// compressed payload does not match the declared size.
    DataError,

    /// The stream finished cleanly before producing its declared number of
    /// bytes.
    ///
    /// Only possible for streams with a defined unpacked size: the end
    /// marker appeared, and the range coder confirmed a clean finish, but
    /// fewer bytes were produced than the header promised.
    IncompleteStream,

    /// An I/O error from the underlying byte source.
    ///
    /// Wraps [`std::io::Error`]. Source exhaustion mid-bitstream surfaces
    /// here as [`std::io::ErrorKind::UnexpectedEof`].
    Io(io::Error),
}

impl LzmaError {
    /// Clones the error kind so a stored error can be surfaced repeatedly.
    ///
    /// Reads that fail after staging bytes for the caller park the error and
    /// deliver the staged bytes first; every later read reproduces it.
    /// `io::Error` is not `Clone`, so the I/O variant is rebuilt from its
    /// kind and message.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::Corrupted => Self::Corrupted,
            Self::IncorrectProperties(b) => Self::IncorrectProperties(*b),
            Self::DictSizeOutOfRange(size) => Self::DictSizeOutOfRange(*size),
            Self::UnexpectedChunkCode(code) => Self::UnexpectedChunkCode(*code),
            Self::DataError => Self::DataError,
            Self::IncompleteStream => Self::IncompleteStream,
            Self::Io(e) => Self::Io(io::Error::new(e.kind(), e.to_string())),
        }
    }
}

impl fmt::Display for LzmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "Corrupted or truncated stream"),
            Self::IncorrectProperties(b) => {
                write!(f, "Incorrect properties byte: 0x{:02x}", b)
            }
            Self::DictSizeOutOfRange(size) => {
                write!(f, "Dictionary size out of range: {}", size)
            }
            Self::UnexpectedChunkCode(code) => {
                write!(f, "Unexpected chunk control byte: 0x{:02x}", code)
            }
            Self::DataError => write!(f, "Compressed data is corrupt"),
            Self::IncompleteStream => {
                write!(f, "Stream ended before the declared size was produced")
            }
            Self::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for LzmaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LzmaError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<LzmaError> for io::Error {
    fn from(e: LzmaError) -> Self {
        match e {
            LzmaError::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LzmaError>;
