//! Classic LZMA stream decoding.
//!
//! One decoded operation is a literal or a match, selected by adaptive
//! bits conditioned on the FSM state and the output position:
//!
//! | Bits             | Operation                                     |
//! |------------------|-----------------------------------------------|
//! | `0` + literal    | one byte through the context-selected coder   |
//! | `10` + len, dist | match with a freshly coded distance           |
//! | `1100`           | single byte at the most recent distance       |
//! | `1101` + len     | match at the most recent distance             |
//! | `1110` + len     | match at the second most recent distance      |
//! | `11110` + len    | match at the third most recent distance       |
//! | `11111` + len    | match at the fourth most recent distance      |
//!
//! A freshly coded distance of `0xFFFF_FFFF` is the end marker. Streams
//! with a declared size may stop without it once the size is produced.
//!
//! ```rust,ignore
//! let file = std::io::BufReader::new(std::fs::File::open("data.lzma")?);
//! let mut reader = LzmaReader::new(file)?;
//! let mut out = Vec::new();
//! std::io::Read::read_to_end(&mut reader, &mut out)?;
//! ```

use std::io;
use std::io::BufRead;
use std::io::Read;

use crate::bit_tree::reverse_decode;
use crate::error::{LzmaError, Result};
use crate::header::{
    normalize_unpack_size, read_stream_header, LzmaProps, DICT_SIZE_MIN,
};
use crate::range_decoder::RangeDecoder;
use crate::state::{
    is_literal_state, state_after_literal, state_after_match, state_after_rep,
    state_after_short_rep, LzmaState, END_POS_MODEL_INDEX, LITERAL_CODER_SIZE,
    MATCH_MAX_LEN, MATCH_MIN_LEN, NUM_ALIGN_BITS, NUM_LEN_TO_POS_STATES,
    NUM_POS_BITS_MAX,
};
use crate::window::Window;

/// Outcome of one decoded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Finished,
}

fn decode_literal<R: BufRead>(
    state: &mut LzmaState,
    rc: &mut RangeDecoder,
    input: &mut R,
    window: &Window,
) -> Result<u8> {
    let prev_byte = if window.is_empty() {
        0u32
    } else {
        u32::from(window.get_byte(1))
    };
    let lit_state = (((window.total() as u32) & state.lit_pos_mask) << state.props.lc)
        + (prev_byte >> (8 - state.props.lc));
    let base = lit_state as usize * LITERAL_CODER_SIZE;

    let mut symbol = 1u32;
    if !is_literal_state(state.state) {
        // Matched literal: fold in the byte at the last match distance
        // until the decoded bits diverge from it.
        let mut match_byte = u32::from(window.get_byte(state.rep0 + 1));
        while symbol < 0x100 {
            let match_bit = (match_byte >> 7) & 1;
            match_byte <<= 1;
            let idx = base + (((1 + match_bit) << 8) + symbol) as usize;
            let bit = rc.decode_bit(input, &mut state.lit_probs[idx])?;
            symbol = (symbol << 1) | bit;
            if match_bit != bit {
                break;
            }
        }
    }
    while symbol < 0x100 {
        let bit = rc.decode_bit(input, &mut state.lit_probs[base + symbol as usize])?;
        symbol = (symbol << 1) | bit;
    }
    Ok((symbol - 0x100) as u8)
}

/// Decodes a match distance for raw length `len`. Returns the zero-based
/// distance; `u32::MAX` is the end marker.
fn decode_distance<R: BufRead>(
    state: &mut LzmaState,
    rc: &mut RangeDecoder,
    input: &mut R,
    len: u32,
) -> Result<u32> {
    let len_state = len.min(NUM_LEN_TO_POS_STATES - 1);
    let pos_slot = state.pos_slot[len_state as usize].decode(rc, input)?;
    if pos_slot < 4 {
        return Ok(pos_slot);
    }

    let num_direct_bits = (pos_slot >> 1) - 1;
    let mut dist = (2 | (pos_slot & 1)) << num_direct_bits;
    if pos_slot < END_POS_MODEL_INDEX {
        // Sub-tree at a slot-dependent offset into the shared table.
        let offset = (dist - pos_slot) as usize;
        dist += reverse_decode(
            &mut state.pos_decoders[offset..],
            num_direct_bits,
            rc,
            input,
        )?;
    } else {
        dist += rc.decode_direct_bits(input, num_direct_bits - NUM_ALIGN_BITS)?
            << NUM_ALIGN_BITS;
        dist += state.align.decode_reverse(rc, input)?;
    }
    Ok(dist)
}

/// Decodes one operation and applies it to the window.
///
/// Size accounting happens here: every produced byte decrements
/// `bytes_left`, and a match that would overshoot a declared size is
/// truncated to it before the call fails with [`LzmaError::DataError`].
pub(crate) fn decode_operation<R: BufRead>(
    state: &mut LzmaState,
    rc: &mut RangeDecoder,
    input: &mut R,
    window: &mut Window,
) -> Result<Step> {
    if state.size_defined
        && state.bytes_left == 0
        && !state.marker_mandatory
        && rc.is_finished()
    {
        return Ok(Step::Finished);
    }

    let pos_state = (window.total() as u32) & state.pos_mask;
    let idx = ((state.state << NUM_POS_BITS_MAX) + pos_state) as usize;

    if rc.decode_bit(input, &mut state.is_match[idx])? == 0 {
        if state.size_defined && state.bytes_left == 0 {
            return Err(LzmaError::DataError);
        }
        let byte = decode_literal(state, rc, input, window)?;
        window.put_byte(byte);
        state.state = state_after_literal(state.state);
        state.bytes_left -= 1;
        return Ok(Step::Continue);
    }

    let len;
    if rc.decode_bit(input, &mut state.is_rep[state.state as usize])? != 0 {
        if state.size_defined && state.bytes_left == 0 {
            return Err(LzmaError::DataError);
        }
        if window.is_empty() {
            return Err(LzmaError::DataError);
        }
        if rc.decode_bit(input, &mut state.is_rep_g0[state.state as usize])? == 0 {
            if rc.decode_bit(input, &mut state.is_rep0_long[idx])? == 0 {
                if !window.check_distance(state.rep0 + 1) {
                    return Err(LzmaError::DataError);
                }
                let byte = window.get_byte(state.rep0 + 1);
                window.put_byte(byte);
                state.state = state_after_short_rep(state.state);
                state.bytes_left -= 1;
                return Ok(Step::Continue);
            }
        } else {
            // Promote the selected distance to the front of the LRU set.
            let dist;
            if rc.decode_bit(input, &mut state.is_rep_g1[state.state as usize])? == 0 {
                dist = state.rep1;
            } else {
                if rc.decode_bit(input, &mut state.is_rep_g2[state.state as usize])? == 0 {
                    dist = state.rep2;
                } else {
                    dist = state.rep3;
                    state.rep3 = state.rep2;
                }
                state.rep2 = state.rep1;
            }
            state.rep1 = state.rep0;
            state.rep0 = dist;
        }
        len = state.rep_len.decode(rc, input, pos_state)?;
        state.state = state_after_rep(state.state);
        if !window.check_distance(state.rep0 + 1) {
            return Err(LzmaError::DataError);
        }
    } else {
        state.rep3 = state.rep2;
        state.rep2 = state.rep1;
        state.rep1 = state.rep0;
        len = state.len.decode(rc, input, pos_state)?;
        state.state = state_after_match(state.state);

        let dist = decode_distance(state, rc, input, len)?;
        if dist == u32::MAX {
            // End marker. Valid only if the range coder lands exactly on
            // its final state, and only once any declared size is met.
            return if rc.is_finished() {
                if state.size_defined && state.bytes_left > 0 {
                    Err(LzmaError::IncompleteStream)
                } else {
                    Ok(Step::Finished)
                }
            } else {
                Err(LzmaError::DataError)
            };
        }
        state.rep0 = dist;
        if state.size_defined && state.bytes_left == 0 {
            return Err(LzmaError::DataError);
        }
        if state.rep0 >= window.size() || !window.check_distance(state.rep0 + 1) {
            return Err(LzmaError::DataError);
        }
    }

    let mut len = len + MATCH_MIN_LEN;
    let mut overshoot = false;
    if state.size_defined && state.bytes_left < u64::from(len) {
        len = state.bytes_left as u32;
        overshoot = true;
    }
    window.copy_match(state.rep0 + 1, len);
    state.bytes_left -= u64::from(len);
    if overshoot {
        return Err(LzmaError::DataError);
    }
    Ok(Step::Continue)
}

/// Decodes operations until `want` bytes are pending, the stream finishes,
/// or the window has too little free room for another worst-case match.
///
/// Returns `true` once the stream is finished. The room guard keeps
/// undelivered bytes from being overwritten: an operation appends at most
/// [`MATCH_MAX_LEN`] bytes.
pub(crate) fn decompress<R: BufRead>(
    state: &mut LzmaState,
    rc: &mut RangeDecoder,
    input: &mut R,
    window: &mut Window,
    want: usize,
) -> Result<bool> {
    while (window.pending() as usize) < want
        && u64::from(window.pending()) + u64::from(MATCH_MAX_LEN) <= u64::from(window.size())
    {
        if decode_operation(state, rc, input, window)? == Step::Finished {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Streaming decoder for classic `.lzma` data.
///
/// Construct with [`new`](Self::new) for a headered stream, or with
/// [`with_properties`](Self::with_properties) for headerless data whose
/// parameters arrive out of band (as in some archive containers). Decoded
/// bytes come out through [`std::io::Read`].
pub struct LzmaReader<R> {
    input: R,
    state: LzmaState,
    rc: RangeDecoder,
    window: Window,
    /// Declared uncompressed size, kept for [`reset`](Self::reset).
    unpack_size: Option<u64>,
    finished: bool,
    /// First decode failure; replayed to every later read.
    error: Option<LzmaError>,
}

impl<R: BufRead> LzmaReader<R> {
    /// Reads the 13-byte stream header and arms the decoder.
    ///
    /// # Errors
    ///
    /// [`LzmaError::Corrupted`] if the header or range-coder prologue is
    /// truncated, [`LzmaError::IncorrectProperties`] for a bad properties
    /// byte.
    pub fn new(mut input: R) -> Result<Self> {
        let header = read_stream_header(&mut input)?;
        Self::with_parts(input, header.props, header.dict_size, header.unpack_size)
    }

    /// Arms a decoder for headerless data with out-of-band parameters.
    ///
    /// `unpack_size` of `None` (or the all-ones sentinel) means the stream
    /// must finish with its end marker. Dictionary sizes below the format
    /// minimum are rounded up.
    ///
    /// # Errors
    ///
    /// [`LzmaError::IncorrectProperties`] for a properties byte of 225 or
    /// more, [`LzmaError::DictSizeOutOfRange`] beyond 4 GiB,
    /// [`LzmaError::Corrupted`] if the range-coder prologue is truncated.
    pub fn with_properties(
        input: R,
        props: u8,
        dict_size: u64,
        unpack_size: Option<u64>,
    ) -> Result<Self> {
        let props = LzmaProps::from_byte(props)?;
        if dict_size > u64::from(u32::MAX) {
            return Err(LzmaError::DictSizeOutOfRange(dict_size));
        }
        let dict_size = (dict_size as u32).max(DICT_SIZE_MIN);
        Self::with_parts(input, props, dict_size, normalize_unpack_size(unpack_size))
    }

    fn with_parts(
        mut input: R,
        props: LzmaProps,
        dict_size: u32,
        unpack_size: Option<u64>,
    ) -> Result<Self> {
        let mut state = LzmaState::new(props);
        state.set_unpack_size(unpack_size);
        let mut rc = RangeDecoder::new();
        rc.init(&mut input)?;
        Ok(Self {
            input,
            state,
            rc,
            window: Window::new(dict_size),
            unpack_size,
            finished: false,
            error: None,
        })
    }

    /// Re-arms the decoder for another stream that follows at the current
    /// input position, keeping properties, dictionary size, and declared
    /// size. Consumes the next range-coder prologue.
    pub fn reset(&mut self) -> Result<()> {
        self.state.reset();
        self.state.set_unpack_size(self.unpack_size);
        self.window.reset();
        self.rc.init(&mut self.input)?;
        self.finished = false;
        self.error = None;
        Ok(())
    }

    /// Like [`reset`](Self::reset), but switches to a new source and
    /// declared size first.
    pub fn reopen(&mut self, input: R, unpack_size: Option<u64>) -> Result<()> {
        self.input = input;
        self.unpack_size = normalize_unpack_size(unpack_size);
        self.reset()
    }

    /// Stream parameters in effect.
    pub fn props(&self) -> LzmaProps {
        self.state.props
    }

    /// Dictionary size in bytes, after the format-minimum round-up.
    pub fn dict_size(&self) -> u32 {
        self.window.size()
    }

    /// Declared uncompressed size, `None` when the stream is
    /// marker-terminated.
    pub fn unpack_size(&self) -> Option<u64> {
        self.unpack_size
    }

    /// True when the stream decoded fully but the range coder reported a
    /// non-fatal irregularity (reserved prologue bits, off-by-one coder
    /// states). Reference decoders warn rather than fail on these.
    pub fn corrupted(&self) -> bool {
        self.rc.is_corrupted()
    }

    /// Returns the wrapped source. Bytes past the end of the compressed
    /// stream are still in it (or in its buffer).
    pub fn into_inner(self) -> R {
        self.input
    }

    pub(crate) fn read_decode(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if let Some(err) = &self.error {
            return Err(err.duplicate());
        }
        if !self.finished && (self.window.pending() as usize) < out.len() {
            match decompress(
                &mut self.state,
                &mut self.rc,
                &mut self.input,
                &mut self.window,
                out.len(),
            ) {
                Ok(done) => self.finished = done,
                Err(err) => {
                    // Hand over whatever decoded cleanly; the error
                    // replays on this and every later call.
                    let n = self.window.read_pending(out);
                    self.error = Some(err.duplicate());
                    if n == 0 {
                        return Err(err);
                    }
                    return Ok(n);
                }
            }
        }
        Ok(self.window.read_pending(out))
    }
}

impl<R: BufRead> Read for LzmaReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_decode(buf).map_err(io::Error::from)
    }
}
