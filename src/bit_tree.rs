//! Adaptive bit-tree symbol decoders.
//!
//! A bit tree stores one probability counter per internal node of a perfect
//! binary tree of depth `num_bits`. Decoding walks the tree from the root,
//! using index `m = 1; m = (m << 1) | bit`, so slot 0 is never touched and
//! the table occupies exactly `2^num_bits` entries. The reverse variant
//! emits the decoded bits low-order first and is used for match distance
//! footers and align bits.

use std::io::BufRead;

use crate::error::Result;
use crate::range_decoder::{Prob, RangeDecoder, PROB_INIT};

pub(crate) struct BitTree {
    pub(crate) probs: Box<[Prob]>,
    pub(crate) num_bits: u32,
}

impl BitTree {
    pub(crate) fn new(num_bits: u32) -> Self {
        Self {
            probs: vec![PROB_INIT; 1 << num_bits].into_boxed_slice(),
            num_bits,
        }
    }

    /// Re-arms every node probability without reallocating.
    pub(crate) fn reset(&mut self) {
        self.probs.fill(PROB_INIT);
    }

    /// Decodes `num_bits` into a symbol, most significant bit first.
    #[inline]
    pub(crate) fn decode<R: BufRead>(
        &mut self,
        rc: &mut RangeDecoder,
        input: &mut R,
    ) -> Result<u32> {
        let mut m = 1u32;
        for _ in 0..self.num_bits {
            let bit = rc.decode_bit(input, &mut self.probs[m as usize])?;
            m = (m << 1) | bit;
        }
        Ok(m - (1 << self.num_bits))
    }

    /// Decodes `num_bits` with the bit order reversed.
    #[inline]
    pub(crate) fn decode_reverse<R: BufRead>(
        &mut self,
        rc: &mut RangeDecoder,
        input: &mut R,
    ) -> Result<u32> {
        reverse_decode(&mut self.probs, self.num_bits, rc, input)
    }
}

/// Reverse bit-tree decode over a borrowed probability slice.
///
/// Distance decoding shares one 115-slot table between the position slots,
/// each slot addressing a sub-tree at a computed offset, so the walk cannot
/// live on a `BitTree` instance.
#[inline]
pub(crate) fn reverse_decode<R: BufRead>(
    probs: &mut [Prob],
    num_bits: u32,
    rc: &mut RangeDecoder,
    input: &mut R,
) -> Result<u32> {
    let mut m = 1u32;
    let mut symbol = 0u32;
    for i in 0..num_bits {
        let bit = rc.decode_bit(input, &mut probs[m as usize])?;
        m = (m << 1) | bit;
        symbol |= bit << i;
    }
    Ok(symbol)
}
