//! LZMA2 container decoding.
//!
//! LZMA2 frames LZMA into self-describing chunks so streams can reset
//! state, switch properties, or splice in stored bytes:
//!
//! | Control       | Chunk                                            |
//! |---------------|--------------------------------------------------|
//! | `0x00`        | end of stream                                    |
//! | `0x01`        | stored bytes, dictionary reset first             |
//! | `0x02`        | stored bytes                                     |
//! | `0x80..=0x9F` | LZMA, carried-over state                         |
//! | `0xA0..=0xBF` | LZMA, state reset                                |
//! | `0xC0..=0xDF` | LZMA, state reset with new properties            |
//! | `0xE0..=0xFF` | LZMA, new properties and dictionary reset        |
//! | other         | invalid                                          |
//!
//! Every chunk declares its sizes up front, so one chunk's range coder
//! can never run into the next chunk's header. Chunks share the sliding
//! dictionary unless a control byte resets it; matches may reach back
//! into bytes produced by earlier chunks.

use std::io;
use std::io::BufRead;
use std::io::Read;

use crate::error::{LzmaError, Result};
use crate::header::{
    read_exact_or_corrupted, read_u8, LzmaProps, DICT_SIZE_MIN,
};
use crate::lzma::decompress;
use crate::range_decoder::RangeDecoder;
use crate::state::LzmaState;
use crate::window::Window;

/// Dictionary used when the caller does not specify one.
const DEFAULT_DICT_SIZE: u32 = 8 * 1024 * 1024;

/// Decodes the one-byte dictionary-size encoding used by LZMA2 container
/// headers (the `.xz` filter properties byte): `2 | (b & 1)` shifted by
/// `b / 2 + 11`, with 40 spelling the 4 GiB maximum.
///
/// # Errors
///
/// [`LzmaError::IncorrectProperties`] for bytes above 40.
pub fn dict_size_from_props(props: u8) -> Result<u32> {
    crate::header::dict_size_from_props(props)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkKind {
    End,
    UncompressedResetDict,
    Uncompressed,
    LzmaNoReset,
    LzmaResetState,
    LzmaNewProps,
    LzmaNewPropsResetDict,
}

impl ChunkKind {
    fn from_control(control: u8) -> Result<Self> {
        match control {
            0x00 => Ok(Self::End),
            0x01 => Ok(Self::UncompressedResetDict),
            0x02 => Ok(Self::Uncompressed),
            0x03..=0x7F => Err(LzmaError::UnexpectedChunkCode(control)),
            _ => Ok(match (control >> 5) & 0x3 {
                0 => Self::LzmaNoReset,
                1 => Self::LzmaResetState,
                2 => Self::LzmaNewProps,
                _ => Self::LzmaNewPropsResetDict,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkPhase {
    /// Next input byte is a chunk control byte.
    Between,
    /// Copying a stored chunk into the dictionary.
    Raw,
    /// Decoding an LZMA chunk.
    Lzma,
    /// Saw the end-of-stream control byte.
    End,
}

/// Restricts reads to the current chunk's declared compressed size, so
/// range-coder refills stop at the chunk boundary instead of swallowing
/// the next header.
struct ChunkInput<'a, R> {
    inner: &'a mut R,
    left: &'a mut u32,
}

impl<R: BufRead> Read for ChunkInput<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let max = buf.len().min(*self.left as usize);
        if max == 0 {
            return Ok(0);
        }
        let n = self.inner.read(&mut buf[..max])?;
        *self.left -= n as u32;
        Ok(n)
    }
}

impl<R: BufRead> BufRead for ChunkInput<'_, R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if *self.left == 0 {
            return Ok(&[]);
        }
        let buf = self.inner.fill_buf()?;
        let n = buf.len().min(*self.left as usize);
        Ok(&buf[..n])
    }

    fn consume(&mut self, amt: usize) {
        *self.left -= amt as u32;
        self.inner.consume(amt);
    }
}

/// Streaming decoder for LZMA2 data.
///
/// ```rust,ignore
/// let mut reader = Lzma2Reader::new(compressed.as_slice(), 0)?;
/// let mut out = Vec::new();
/// std::io::Read::read_to_end(&mut reader, &mut out)?;
/// ```
pub struct Lzma2Reader<R> {
    input: R,
    state: LzmaState,
    rc: RangeDecoder,
    window: Window,
    phase: ChunkPhase,
    /// Compressed (or stored) bytes left in the current chunk.
    compressed_left: u32,
    /// False until a chunk has carried a properties byte; LZMA chunks
    /// may not reference properties that were never transmitted.
    props_known: bool,
    /// First decode failure; replayed to every later read.
    error: Option<LzmaError>,
}

impl<R: BufRead> Lzma2Reader<R> {
    /// Arms a decoder over `input` with a dictionary of `dict_size`
    /// bytes. Sizes below the 4 KiB format minimum (zero included)
    /// select the 8 MiB default.
    ///
    /// # Errors
    ///
    /// [`LzmaError::DictSizeOutOfRange`] beyond 4 GiB.
    pub fn new(input: R, dict_size: u64) -> Result<Self> {
        if dict_size > u64::from(u32::MAX) {
            return Err(LzmaError::DictSizeOutOfRange(dict_size));
        }
        let mut dict_size = dict_size as u32;
        if dict_size < DICT_SIZE_MIN {
            dict_size = DEFAULT_DICT_SIZE;
        }
        Ok(Self {
            input,
            state: LzmaState::new(LzmaProps { lc: 0, lp: 0, pb: 0 }),
            rc: RangeDecoder::new(),
            window: Window::new(dict_size),
            phase: ChunkPhase::Between,
            compressed_left: 0,
            props_known: false,
            error: None,
        })
    }

    /// Dictionary size in bytes.
    pub fn dict_size(&self) -> u32 {
        self.window.size()
    }

    /// True when the stream decoded fully but a chunk's range coder
    /// reported a non-fatal irregularity. See
    /// [`LzmaReader::corrupted`](crate::LzmaReader::corrupted).
    pub fn corrupted(&self) -> bool {
        self.rc.is_corrupted()
    }

    /// Returns the wrapped source. Bytes past the end-of-stream control
    /// byte are still in it (or in its buffer).
    pub fn into_inner(self) -> R {
        self.input
    }

    /// Parses one chunk header and arms the matching phase.
    fn start_chunk(&mut self) -> Result<()> {
        let control = read_u8(&mut self.input)?;
        let kind = ChunkKind::from_control(control)?;
        match kind {
            ChunkKind::End => {
                self.phase = ChunkPhase::End;
            }
            ChunkKind::UncompressedResetDict | ChunkKind::Uncompressed => {
                let mut raw = [0u8; 2];
                read_exact_or_corrupted(&mut self.input, &mut raw)?;
                if kind == ChunkKind::UncompressedResetDict {
                    self.window.reset();
                }
                self.compressed_left = u32::from(u16::from_be_bytes(raw)) + 1;
                self.phase = ChunkPhase::Raw;
            }
            _ => {
                let mut raw = [0u8; 4];
                read_exact_or_corrupted(&mut self.input, &mut raw)?;
                let unpack_size = ((u32::from(control & 0x1F) << 16)
                    | u32::from(u16::from_be_bytes([raw[0], raw[1]])))
                    + 1;
                let comp_size = u32::from(u16::from_be_bytes([raw[2], raw[3]])) + 1;

                match kind {
                    ChunkKind::LzmaNewProps | ChunkKind::LzmaNewPropsResetDict => {
                        let props = LzmaProps::from_byte(read_u8(&mut self.input)?)?;
                        self.state.renew(props);
                        self.props_known = true;
                    }
                    ChunkKind::LzmaResetState => {
                        if !self.props_known {
                            return Err(LzmaError::DataError);
                        }
                        self.state.reset();
                    }
                    _ => {
                        if !self.props_known {
                            return Err(LzmaError::DataError);
                        }
                    }
                }
                if kind == ChunkKind::LzmaNewPropsResetDict {
                    self.window.reset();
                }
                self.state.set_unpack_size(Some(u64::from(unpack_size)));

                self.compressed_left = comp_size;
                let mut chunk = ChunkInput {
                    inner: &mut self.input,
                    left: &mut self.compressed_left,
                };
                self.rc.init(&mut chunk)?;
                self.phase = ChunkPhase::Lzma;
            }
        }
        Ok(())
    }

    /// Advances the chunk state machine once. Only called with an empty
    /// pending region, so dictionary resets can never drop undelivered
    /// bytes.
    fn step(&mut self, want: usize) -> Result<()> {
        match self.phase {
            ChunkPhase::Between => self.start_chunk(),
            ChunkPhase::End => Ok(()),
            ChunkPhase::Raw => {
                let n = self
                    .window
                    .fill_from(&mut self.input, self.compressed_left)?;
                if n == 0 && self.compressed_left > 0 {
                    return Err(LzmaError::Corrupted);
                }
                self.compressed_left -= n;
                if self.compressed_left == 0 {
                    self.phase = ChunkPhase::Between;
                }
                Ok(())
            }
            ChunkPhase::Lzma => {
                let result = {
                    let mut chunk = ChunkInput {
                        inner: &mut self.input,
                        left: &mut self.compressed_left,
                    };
                    decompress(
                        &mut self.state,
                        &mut self.rc,
                        &mut chunk,
                        &mut self.window,
                        want,
                    )
                };
                match result {
                    Ok(true) => {
                        // The declared sizes must both land exactly.
                        if self.compressed_left != 0 {
                            return Err(LzmaError::DataError);
                        }
                        self.phase = ChunkPhase::Between;
                        Ok(())
                    }
                    Ok(false) => Ok(()),
                    Err(LzmaError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        // Starved range coder: either the chunk declared
                        // too few compressed bytes, or the source really
                        // ended mid-chunk.
                        Err(if self.compressed_left == 0 {
                            LzmaError::DataError
                        } else {
                            LzmaError::Corrupted
                        })
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    pub(crate) fn read_decode(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if let Some(err) = &self.error {
            return Err(err.duplicate());
        }
        loop {
            if self.window.pending() > 0 {
                return Ok(self.window.read_pending(out));
            }
            if self.phase == ChunkPhase::End {
                return Ok(0);
            }
            if let Err(err) = self.step(out.len()) {
                let n = self.window.read_pending(out);
                self.error = Some(err.duplicate());
                if n == 0 {
                    return Err(err);
                }
                return Ok(n);
            }
        }
    }
}

impl<R: BufRead> Read for Lzma2Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_decode(buf).map_err(io::Error::from)
    }
}
