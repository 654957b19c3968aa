//! Binary range decoder for the LZMA bitstream.
//!
//! Range coding is an entropy coding method similar to arithmetic coding:
//! the encoder narrows a 32-bit interval for every bit it emits, and the
//! decoder replays the same narrowing to recover the bits. Probabilities are
//! adaptive 11-bit counters updated in place on every decoded bit.
//!
//! The decoder holds only `range` and `code`; input bytes are pulled from a
//! caller-supplied reader passed to each call, so the same decoder can be
//! re-pointed at a new source (LZMA2 re-initializes it once per chunk).

use std::io::{BufRead, ErrorKind};

use crate::error::{LzmaError, Result};

/// Adaptive probability counter: 11-bit fixed point, `0..2048`.
pub(crate) type Prob = u16;

/// Number of bits in the probability model scale.
pub(crate) const MODEL_TOTAL_BITS: u32 = 11;

/// Rescale shift applied on every probability update.
pub(crate) const MOVE_BITS: u32 = 5;

/// Initial value for every probability counter (scale midpoint).
pub(crate) const PROB_INIT: Prob = (1 << MODEL_TOTAL_BITS) / 2;

/// Normalization threshold (2^24): `range` never drops below this between
/// decode calls.
pub(crate) const TOP: u32 = 1 << 24;

/// Pulls one byte from a buffered source.
///
/// An empty source maps to `UnexpectedEof`; callers that consider exhaustion
/// a framing error remap it.
#[inline]
pub(crate) fn next_byte<R: BufRead>(input: &mut R) -> Result<u8> {
    loop {
        match input.fill_buf() {
            Ok([]) => {
                return Err(LzmaError::Io(ErrorKind::UnexpectedEof.into()));
            }
            Ok(buf) => {
                let byte = buf[0];
                input.consume(1);
                return Ok(byte);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(LzmaError::Io(e)),
        }
    }
}

/// Range decoder state.
///
/// Construction does not touch the input; call [`init`](Self::init) to
/// consume the 5-byte prologue before decoding.
pub(crate) struct RangeDecoder {
    /// Current interval width, kept `>= 2^24` by normalization.
    range: u32,
    /// Encoder position inside the interval.
    code: u32,
    /// Diagnostic flag: prologue or direct-bit anomalies seen.
    corrupted: bool,
}

impl RangeDecoder {
    pub(crate) fn new() -> Self {
        Self {
            range: 0xFFFF_FFFF,
            code: 0,
            corrupted: false,
        }
    }

    /// Consumes the 5-byte prologue: one reserved zero byte, then four
    /// big-endian bytes forming the initial `code`.
    ///
    /// A truncated prologue is [`LzmaError::Corrupted`]. A nonzero reserved
    /// byte or `code == range` does not fail, it only sets the
    /// [`corrupted`](Self::is_corrupted) flag, matching the reference
    /// decoder which treats both as a warning.
    pub(crate) fn init<R: BufRead>(&mut self, input: &mut R) -> Result<()> {
        self.range = 0xFFFF_FFFF;
        self.code = 0;
        self.corrupted = false;

        let mut prologue = [0u8; 5];
        input.read_exact(&mut prologue).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                LzmaError::Corrupted
            } else {
                LzmaError::Io(e)
            }
        })?;

        for byte in &prologue[1..] {
            self.code = (self.code << 8) | u32::from(*byte);
        }
        if prologue[0] != 0 || self.code == self.range {
            self.corrupted = true;
        }
        Ok(())
    }

    /// A finished stream leaves `code == 0` after its last operation.
    #[inline]
    pub(crate) fn is_finished(&self) -> bool {
        self.code == 0
    }

    pub(crate) fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Refills `range` one byte at a time once it drops below 2^24.
    #[inline(always)]
    fn normalize<R: BufRead>(&mut self, input: &mut R) -> Result<()> {
        if self.range < TOP {
            self.range <<= 8;
            self.code = (self.code << 8) | u32::from(next_byte(input)?);
        }
        Ok(())
    }

    /// Decodes one bit against an adaptive probability, updating it in
    /// place.
    #[inline(always)]
    pub(crate) fn decode_bit<R: BufRead>(
        &mut self,
        input: &mut R,
        prob: &mut Prob,
    ) -> Result<u32> {
        let bound = (self.range >> MODEL_TOTAL_BITS) * u32::from(*prob);
        let bit;
        if self.code < bound {
            *prob += ((1 << MODEL_TOTAL_BITS) - *prob) >> MOVE_BITS;
            self.range = bound;
            bit = 0;
        } else {
            *prob -= *prob >> MOVE_BITS;
            self.code -= bound;
            self.range -= bound;
            bit = 1;
        }
        self.normalize(input)?;
        Ok(bit)
    }

    /// Decodes `count` fixed-probability bits, most significant first.
    ///
    /// Used for the high bits of large match distances. The branchless
    /// halve-and-compare form mirrors the reference decoder, including the
    /// `code == range` corruption diagnostic.
    pub(crate) fn decode_direct_bits<R: BufRead>(
        &mut self,
        input: &mut R,
        count: u32,
    ) -> Result<u32> {
        let mut result = 0u32;
        for _ in 0..count {
            self.range >>= 1;
            self.code = self.code.wrapping_sub(self.range);
            let t = 0u32.wrapping_sub(self.code >> 31);
            self.code = self.code.wrapping_add(self.range & t);
            if self.code == self.range {
                self.corrupted = true;
            }
            self.normalize(input)?;
            result = (result << 1).wrapping_add(t.wrapping_add(1));
        }
        Ok(result)
    }
}
