//! Match length decoding.
//!
//! Lengths are coded in three tiers: a 3-bit tree per position state for
//! 0..=7, another 3-bit tree per position state for 8..=15, and one shared
//! 8-bit tree for 16..=271. Two choice bits select the tier. Callers add the
//! format's minimum match length of 2 to the decoded value.

use std::io::BufRead;

use crate::bit_tree::BitTree;
use crate::error::Result;
use crate::range_decoder::{Prob, RangeDecoder, PROB_INIT};
use crate::state::NUM_POS_BITS_MAX;

const LOW_BITS: u32 = 3;
const MID_BITS: u32 = 3;
const HIGH_BITS: u32 = 8;

pub(crate) struct LenDecoder {
    pub(crate) choice: Prob,
    pub(crate) choice2: Prob,
    pub(crate) low: Vec<BitTree>,
    pub(crate) mid: Vec<BitTree>,
    pub(crate) high: BitTree,
}

impl LenDecoder {
    pub(crate) fn new() -> Self {
        let states = 1 << NUM_POS_BITS_MAX;
        Self {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: (0..states).map(|_| BitTree::new(LOW_BITS)).collect(),
            mid: (0..states).map(|_| BitTree::new(MID_BITS)).collect(),
            high: BitTree::new(HIGH_BITS),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.choice = PROB_INIT;
        self.choice2 = PROB_INIT;
        for tree in &mut self.low {
            tree.reset();
        }
        for tree in &mut self.mid {
            tree.reset();
        }
        self.high.reset();
    }

    /// Decodes a raw length in `0..=271`.
    #[inline]
    pub(crate) fn decode<R: BufRead>(
        &mut self,
        rc: &mut RangeDecoder,
        input: &mut R,
        pos_state: u32,
    ) -> Result<u32> {
        if rc.decode_bit(input, &mut self.choice)? == 0 {
            return self.low[pos_state as usize].decode(rc, input);
        }
        if rc.decode_bit(input, &mut self.choice2)? == 0 {
            return Ok(8 + self.mid[pos_state as usize].decode(rc, input)?);
        }
        Ok(16 + self.high.decode(rc, input)?)
    }
}
