//! Streaming LZMA and LZMA2 decoding.
//!
//! Decodes the raw LZMA bitstream and the LZMA2 chunk framing layered on
//! top of it, pulling compressed bytes through [`std::io::BufRead`] and
//! handing decoded bytes out through [`std::io::Read`]. Memory use is the
//! dictionary plus probability tables, independent of stream length.
//!
//! ## Readers
//!
//! | Reader | Format |
//! |--------|--------|
//! | [`LzmaReader`] | classic `.lzma` streams, and headerless raw LZMA |
//! | [`Lzma2Reader`] | LZMA2 chunk sequences (the `.xz` payload coding) |
//!
//! ## Features
//! - **Zero dependencies**
//! - No `unsafe`; every dictionary access is bounds-checked
//! - Malformed input fails with a typed [`LzmaError`], never a panic
//!
//! ## Example
//!
//! ```rust
//! use lzma_stream::lzma_decompress;
//!
//! // 13-byte header declaring four output bytes, then range-coded data
//! // (an all-zero payload decodes to zero bytes).
//! let mut data = vec![0x5D, 0x00, 0x10, 0x00, 0x00];
//! data.extend_from_slice(&4u64.to_le_bytes());
//! data.extend_from_slice(&[0u8; 24]);
//!
//! let mut out = Vec::new();
//! let n = lzma_decompress(data.as_slice(), &mut out).unwrap();
//! assert_eq!(n, 4);
//! assert_eq!(out, [0, 0, 0, 0]);
//! ```
//!
//! ## Architecture
//!
//! The decoding pipeline:
//!
//! ```text
//! Compressed Data
//!       ↓
//! ┌──────────────┐
//! │ Chunk parser │ ← LZMA2 only: framing, resets, stored chunks
//! └──────────────┘
//!       ↓
//! ┌──────────────┐
//! │ Range coder  │ ← adaptive binary arithmetic decoding
//! └──────────────┘
//!       ↓
//! ┌──────────────┐
//! │ Op decoder   │ ← literals, matches, repeated distances
//! └──────────────┘
//!       ↓
//! ┌──────────────┐
//! │    Window    │ ← sliding dictionary; decoded bytes drain from here
//! └──────────────┘
//! ```

mod bit_tree;
pub mod error;
mod header;
mod len_decoder;
mod lzma;
mod lzma2;
mod range_decoder;
mod state;
mod window;

#[cfg(test)]
mod test_utils;

pub use error::{LzmaError, Result};
pub use header::LzmaProps;
pub use lzma::LzmaReader;
pub use lzma2::{dict_size_from_props, Lzma2Reader};

use std::io::BufRead;
use std::io::Write;

/// Decompresses a whole headered `.lzma` stream into `output`, returning
/// the number of bytes produced.
///
/// Convenience wrapper over [`LzmaReader`] for in-memory use; streaming
/// callers should drive the reader directly.
pub fn lzma_decompress<R: BufRead, W: Write>(input: R, output: &mut W) -> Result<u64> {
    let mut reader = LzmaReader::new(input)?;
    drain(&mut |buf| reader.read_decode(buf), output)
}

/// Decompresses a whole LZMA2 chunk sequence into `output`, returning the
/// number of bytes produced. A `dict_size` of zero selects the default
/// dictionary.
pub fn lzma2_decompress<R: BufRead, W: Write>(
    input: R,
    output: &mut W,
    dict_size: u64,
) -> Result<u64> {
    let mut reader = Lzma2Reader::new(input, dict_size)?;
    drain(&mut |buf| reader.read_decode(buf), output)
}

fn drain<W: Write>(
    read: &mut dyn FnMut(&mut [u8]) -> Result<usize>,
    output: &mut W,
) -> Result<u64> {
    let mut buf = [0u8; 32 * 1024];
    let mut total = 0u64;
    loop {
        let n = read(&mut buf)?;
        if n == 0 {
            return Ok(total);
        }
        output.write_all(&buf[..n])?;
        total += n as u64;
    }
}
