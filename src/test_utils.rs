//! Test fixtures: a script-driven reference encoder and raw stream
//! builders.
//!
//! The encoder drives the same probability tables as the decoder (it
//! borrows [`LzmaState`] wholesale), so any operation script it emits is a
//! bit-exact valid stream. Tests describe output as explicit operations
//! (literals, matches, rep matches) instead of relying on a production
//! encoder's match finder, which keeps expectations deterministic.

use crate::bit_tree::BitTree;
use crate::header::LzmaProps;
use crate::len_decoder::LenDecoder;
use crate::range_decoder::{Prob, MODEL_TOTAL_BITS, MOVE_BITS, TOP};
use crate::state::{
    is_literal_state, state_after_literal, state_after_match, state_after_rep,
    state_after_short_rep, LzmaState, END_POS_MODEL_INDEX, LITERAL_CODER_SIZE,
    MATCH_MAX_LEN, MATCH_MIN_LEN, NUM_ALIGN_BITS, NUM_LEN_TO_POS_STATES,
    NUM_POS_BITS_MAX,
};

/// Carry-propagating range encoder, the mirror image of the decoder: the
/// same probability updates, the same normalize-after-update timing.
pub(crate) struct RangeEncoder {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64,
    out: Vec<u8>,
}

impl RangeEncoder {
    pub(crate) fn new() -> Self {
        Self {
            low: 0,
            range: 0xFFFF_FFFF,
            cache: 0,
            // The first flushed byte is the cache's initial zero, which
            // becomes the prologue's reserved byte.
            cache_size: 1,
            out: Vec::new(),
        }
    }

    fn shift_low(&mut self) {
        let carry = (self.low >> 32) as u32;
        if carry != 0 || self.low < 0xFF00_0000 {
            let mut byte = self.cache;
            loop {
                self.out.push((u32::from(byte) + carry) as u8);
                byte = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = (self.low >> 24) as u8;
        }
        self.cache_size += 1;
        self.low = (self.low & 0x00FF_FFFF) << 8;
    }

    pub(crate) fn encode_bit(&mut self, prob: &mut Prob, bit: u32) {
        let bound = (self.range >> MODEL_TOTAL_BITS) * u32::from(*prob);
        if bit == 0 {
            *prob += ((1 << MODEL_TOTAL_BITS) - *prob) >> MOVE_BITS;
            self.range = bound;
        } else {
            *prob -= *prob >> MOVE_BITS;
            self.low += u64::from(bound);
            self.range -= bound;
        }
        if self.range < TOP {
            self.range <<= 8;
            self.shift_low();
        }
    }

    pub(crate) fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.range >>= 1;
            if (value >> i) & 1 != 0 {
                self.low += u64::from(self.range);
            }
            if self.range < TOP {
                self.range <<= 8;
                self.shift_low();
            }
        }
    }

    /// Flushes `low` in full; the decoder's code lands exactly on zero
    /// after consuming the flushed bytes.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        for _ in 0..5 {
            self.shift_low();
        }
        self.out
    }
}

fn slot_for_distance(dist: u32) -> u32 {
    if dist < 4 {
        return dist;
    }
    let top = 31 - dist.leading_zeros();
    (top << 1) | ((dist >> (top - 1)) & 1)
}

/// Encodes an explicit operation script into LZMA compressed bytes.
///
/// State carries across [`finish_chunk`](Self::finish_chunk) calls the way
/// decoder state carries across LZMA2 chunks, so multi-chunk scripts can
/// exercise carried-over probabilities and repeat distances.
pub(crate) struct OpEncoder {
    state: LzmaState,
    rc: RangeEncoder,
    /// Every byte the script produced, in order; the expected decode.
    history: Vec<u8>,
    /// Index into `history` where the current dictionary began.
    dict_start: usize,
}

impl OpEncoder {
    pub(crate) fn new(props: LzmaProps) -> Self {
        Self {
            state: LzmaState::new(props),
            rc: RangeEncoder::new(),
            history: Vec::new(),
            dict_start: 0,
        }
    }

    pub(crate) fn history(&self) -> &[u8] {
        &self.history
    }

    fn total(&self) -> u32 {
        (self.history.len() - self.dict_start) as u32
    }

    fn pos_state(&self) -> u32 {
        self.total() & self.state.pos_mask
    }

    fn match_idx(&self) -> usize {
        ((self.state.state << NUM_POS_BITS_MAX) + self.pos_state()) as usize
    }

    fn hist_byte(&self, dist: u32) -> u8 {
        assert!(
            dist as usize <= self.history.len() - self.dict_start,
            "script references distance {dist} beyond produced history"
        );
        self.history[self.history.len() - dist as usize]
    }

    fn encode_tree(rc: &mut RangeEncoder, tree: &mut BitTree, symbol: u32) {
        let mut m = 1u32;
        for i in (0..tree.num_bits).rev() {
            let bit = (symbol >> i) & 1;
            rc.encode_bit(&mut tree.probs[m as usize], bit);
            m = (m << 1) | bit;
        }
    }

    fn encode_reverse(rc: &mut RangeEncoder, probs: &mut [Prob], num_bits: u32, symbol: u32) {
        let mut m = 1u32;
        for i in 0..num_bits {
            let bit = (symbol >> i) & 1;
            rc.encode_bit(&mut probs[m as usize], bit);
            m = (m << 1) | bit;
        }
    }

    fn encode_len(rc: &mut RangeEncoder, len: &mut LenDecoder, pos_state: u32, raw: u32) {
        if raw < 8 {
            rc.encode_bit(&mut len.choice, 0);
            Self::encode_tree(rc, &mut len.low[pos_state as usize], raw);
        } else if raw < 16 {
            rc.encode_bit(&mut len.choice, 1);
            rc.encode_bit(&mut len.choice2, 0);
            Self::encode_tree(rc, &mut len.mid[pos_state as usize], raw - 8);
        } else {
            rc.encode_bit(&mut len.choice, 1);
            rc.encode_bit(&mut len.choice2, 1);
            Self::encode_tree(rc, &mut len.high, raw - 16);
        }
    }

    pub(crate) fn literal(&mut self, byte: u8) {
        let idx = self.match_idx();
        self.rc.encode_bit(&mut self.state.is_match[idx], 0);

        let prev = if self.history.len() == self.dict_start {
            0u32
        } else {
            u32::from(self.history[self.history.len() - 1])
        };
        let lit_state = ((self.total() & self.state.lit_pos_mask) << self.state.props.lc)
            + (prev >> (8 - self.state.props.lc));
        let base = lit_state as usize * LITERAL_CODER_SIZE;

        let mut matched = !is_literal_state(self.state.state);
        let match_byte = if matched {
            u32::from(self.hist_byte(self.state.rep0 + 1))
        } else {
            0
        };
        let mut context = 1u32;
        for i in (0..8).rev() {
            let bit = (u32::from(byte) >> i) & 1;
            if matched {
                let match_bit = (match_byte >> i) & 1;
                let slot = base + (((1 + match_bit) << 8) + context) as usize;
                self.rc.encode_bit(&mut self.state.lit_probs[slot], bit);
                matched = match_bit == bit;
            } else {
                self.rc
                    .encode_bit(&mut self.state.lit_probs[base + context as usize], bit);
            }
            context = (context << 1) | bit;
        }
        self.state.state = state_after_literal(self.state.state);
        self.history.push(byte);
    }

    pub(crate) fn text(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.literal(*byte);
        }
    }

    /// Match at 1-based distance `dist`, `2..=273` bytes.
    pub(crate) fn match_op(&mut self, dist: u32, len: u32) {
        assert!((MATCH_MIN_LEN..=MATCH_MAX_LEN).contains(&len));
        let idx = self.match_idx();
        let pos_state = self.pos_state();
        self.rc.encode_bit(&mut self.state.is_match[idx], 1);
        self.rc
            .encode_bit(&mut self.state.is_rep[self.state.state as usize], 0);
        self.state.rep3 = self.state.rep2;
        self.state.rep2 = self.state.rep1;
        self.state.rep1 = self.state.rep0;
        let raw = len - MATCH_MIN_LEN;
        Self::encode_len(&mut self.rc, &mut self.state.len, pos_state, raw);
        self.state.state = state_after_match(self.state.state);
        self.state.rep0 = dist - 1;
        self.encode_dist(raw, dist - 1);
        self.copy(dist, len);
    }

    /// Match reusing repeat-distance slot `which` (0 is the most recent).
    pub(crate) fn rep_op(&mut self, which: usize, len: u32) {
        assert!((MATCH_MIN_LEN..=MATCH_MAX_LEN).contains(&len));
        let idx = self.match_idx();
        let pos_state = self.pos_state();
        self.rc.encode_bit(&mut self.state.is_match[idx], 1);
        self.rc
            .encode_bit(&mut self.state.is_rep[self.state.state as usize], 1);
        let s = self.state.state as usize;
        match which {
            0 => {
                self.rc.encode_bit(&mut self.state.is_rep_g0[s], 0);
                self.rc.encode_bit(&mut self.state.is_rep0_long[idx], 1);
            }
            1 => {
                self.rc.encode_bit(&mut self.state.is_rep_g0[s], 1);
                self.rc.encode_bit(&mut self.state.is_rep_g1[s], 0);
                let dist = self.state.rep1;
                self.state.rep1 = self.state.rep0;
                self.state.rep0 = dist;
            }
            2 => {
                self.rc.encode_bit(&mut self.state.is_rep_g0[s], 1);
                self.rc.encode_bit(&mut self.state.is_rep_g1[s], 1);
                self.rc.encode_bit(&mut self.state.is_rep_g2[s], 0);
                let dist = self.state.rep2;
                self.state.rep2 = self.state.rep1;
                self.state.rep1 = self.state.rep0;
                self.state.rep0 = dist;
            }
            3 => {
                self.rc.encode_bit(&mut self.state.is_rep_g0[s], 1);
                self.rc.encode_bit(&mut self.state.is_rep_g1[s], 1);
                self.rc.encode_bit(&mut self.state.is_rep_g2[s], 1);
                let dist = self.state.rep3;
                self.state.rep3 = self.state.rep2;
                self.state.rep2 = self.state.rep1;
                self.state.rep1 = self.state.rep0;
                self.state.rep0 = dist;
            }
            _ => panic!("repeat slot out of range: {which}"),
        }
        Self::encode_len(&mut self.rc, &mut self.state.rep_len, pos_state, len - MATCH_MIN_LEN);
        self.state.state = state_after_rep(self.state.state);
        self.copy(self.state.rep0 + 1, len);
    }

    /// Encodes a match without validating the distance or extending the
    /// history. For building streams the decoder must reject.
    pub(crate) fn match_op_unchecked(&mut self, dist: u32, len: u32) {
        let idx = self.match_idx();
        let pos_state = self.pos_state();
        self.rc.encode_bit(&mut self.state.is_match[idx], 1);
        self.rc
            .encode_bit(&mut self.state.is_rep[self.state.state as usize], 0);
        Self::encode_len(&mut self.rc, &mut self.state.len, pos_state, len - MATCH_MIN_LEN);
        self.state.state = state_after_match(self.state.state);
        self.encode_dist(len - MATCH_MIN_LEN, dist - 1);
    }

    /// Encodes a rep match without validation or history upkeep. For
    /// building streams the decoder must reject.
    pub(crate) fn rep_op_unchecked(&mut self, len: u32) {
        let idx = self.match_idx();
        let pos_state = self.pos_state();
        self.rc.encode_bit(&mut self.state.is_match[idx], 1);
        let s = self.state.state as usize;
        self.rc.encode_bit(&mut self.state.is_rep[s], 1);
        self.rc.encode_bit(&mut self.state.is_rep_g0[s], 0);
        self.rc.encode_bit(&mut self.state.is_rep0_long[idx], 1);
        Self::encode_len(&mut self.rc, &mut self.state.rep_len, pos_state, len - MATCH_MIN_LEN);
        self.state.state = state_after_rep(self.state.state);
    }

    /// Single byte at the most recent repeat distance.
    pub(crate) fn short_rep(&mut self) {
        let idx = self.match_idx();
        self.rc.encode_bit(&mut self.state.is_match[idx], 1);
        let s = self.state.state as usize;
        self.rc.encode_bit(&mut self.state.is_rep[s], 1);
        self.rc.encode_bit(&mut self.state.is_rep_g0[s], 0);
        self.rc.encode_bit(&mut self.state.is_rep0_long[idx], 0);
        self.state.state = state_after_short_rep(self.state.state);
        self.copy(self.state.rep0 + 1, 1);
    }

    /// Emits the in-band end marker (a match with the all-ones distance).
    pub(crate) fn end_marker(&mut self) {
        let idx = self.match_idx();
        let pos_state = self.pos_state();
        self.rc.encode_bit(&mut self.state.is_match[idx], 1);
        self.rc
            .encode_bit(&mut self.state.is_rep[self.state.state as usize], 0);
        self.state.rep3 = self.state.rep2;
        self.state.rep2 = self.state.rep1;
        self.state.rep1 = self.state.rep0;
        Self::encode_len(&mut self.rc, &mut self.state.len, pos_state, 0);
        self.state.state = state_after_match(self.state.state);
        self.encode_dist(0, u32::MAX);
    }

    fn encode_dist(&mut self, raw_len: u32, dist: u32) {
        let len_state = raw_len.min(NUM_LEN_TO_POS_STATES - 1) as usize;
        let slot = slot_for_distance(dist);
        Self::encode_tree(&mut self.rc, &mut self.state.pos_slot[len_state], slot);
        if slot < 4 {
            return;
        }
        let num_direct_bits = (slot >> 1) - 1;
        let base = (2 | (slot & 1)) << num_direct_bits;
        let footer = dist - base;
        if slot < END_POS_MODEL_INDEX {
            let offset = (base - slot) as usize;
            Self::encode_reverse(
                &mut self.rc,
                &mut self.state.pos_decoders[offset..],
                num_direct_bits,
                footer,
            );
        } else {
            self.rc
                .encode_direct_bits(footer >> NUM_ALIGN_BITS, num_direct_bits - NUM_ALIGN_BITS);
            Self::encode_reverse(
                &mut self.rc,
                &mut self.state.align.probs,
                NUM_ALIGN_BITS,
                footer & ((1 << NUM_ALIGN_BITS) - 1),
            );
        }
    }

    fn copy(&mut self, dist: u32, len: u32) {
        for _ in 0..len {
            let byte = self.hist_byte(dist);
            self.history.push(byte);
        }
    }

    /// Flushes the range coder and returns the chunk's compressed bytes.
    /// Probability state and history carry over to the next chunk.
    pub(crate) fn finish_chunk(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.rc, RangeEncoder::new()).finish()
    }

    /// Mirror of an LZMA2 state-reset control.
    pub(crate) fn reset_state(&mut self) {
        self.state.reset();
    }

    /// Mirror of an LZMA2 new-properties control.
    pub(crate) fn renew(&mut self, props: LzmaProps) {
        self.state.renew(props);
    }

    /// Mirror of an LZMA2 dictionary-reset control.
    pub(crate) fn reset_dict(&mut self) {
        self.dict_start = self.history.len();
    }

    /// Accounts for bytes spliced in by a stored chunk.
    pub(crate) fn stored(&mut self, data: &[u8]) {
        self.history.extend_from_slice(data);
    }
}

/// Classic 13-byte header followed by compressed payload.
pub(crate) fn lzma1_stream(
    props: LzmaProps,
    dict_size: u32,
    unpack_size: Option<u64>,
    payload: &[u8],
) -> Vec<u8> {
    let mut out = vec![props.to_byte()];
    out.extend_from_slice(&dict_size.to_le_bytes());
    out.extend_from_slice(&unpack_size.unwrap_or(u64::MAX).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// One LZMA2 chunk: `mode` is the control's reset field (0 carry-over,
/// 1 state reset, 2 new props, 3 new props and dictionary reset).
pub(crate) fn lzma2_lzma_chunk(
    mode: u8,
    props: Option<LzmaProps>,
    unpack_len: usize,
    payload: &[u8],
) -> Vec<u8> {
    assert!(mode < 4);
    assert_eq!(mode >= 2, props.is_some());
    assert!((1..=1 << 21).contains(&unpack_len));
    assert!((1..=1 << 16).contains(&payload.len()));
    let unc = unpack_len - 1;
    let mut out = vec![0x80 | (mode << 5) | ((unc >> 16) as u8)];
    out.extend_from_slice(&((unc & 0xFFFF) as u16).to_be_bytes());
    out.extend_from_slice(&((payload.len() - 1) as u16).to_be_bytes());
    if let Some(props) = props {
        out.push(props.to_byte());
    }
    out.extend_from_slice(payload);
    out
}

/// One stored LZMA2 chunk.
pub(crate) fn lzma2_stored_chunk(reset_dict: bool, payload: &[u8]) -> Vec<u8> {
    assert!((1..=1 << 16).contains(&payload.len()));
    let mut out = vec![if reset_dict { 0x01 } else { 0x02 }];
    out.extend_from_slice(&((payload.len() - 1) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

mod tests {
    use super::*;
    use crate::range_decoder::{RangeDecoder, PROB_INIT};

    // The fixture only works if the mirror encoder is bit-exact: every bit
    // decodes back, and the decoder's code register drains to zero on the
    // last byte.
    #[test]
    fn test_encoder_decoder_parity() {
        let bits = [0u32, 1, 1, 0, 0, 0, 1, 0, 1, 1, 1, 0, 0, 1, 0, 0];
        let mut enc = RangeEncoder::new();
        let mut prob = PROB_INIT;
        for &bit in &bits {
            enc.encode_bit(&mut prob, bit);
        }
        enc.encode_direct_bits(0x5A3C, 16);
        let data = enc.finish();

        let mut input = data.as_slice();
        let mut dec = RangeDecoder::new();
        dec.init(&mut input).unwrap();
        let mut prob = PROB_INIT;
        for &bit in &bits {
            assert_eq!(dec.decode_bit(&mut input, &mut prob).unwrap(), bit);
        }
        assert_eq!(dec.decode_direct_bits(&mut input, 16).unwrap(), 0x5A3C);
        assert!(dec.is_finished());
        assert!(!dec.is_corrupted());
        assert!(input.is_empty());
    }

    #[test]
    fn test_slot_for_distance_matches_slot_bases() {
        assert_eq!(slot_for_distance(0), 0);
        assert_eq!(slot_for_distance(3), 3);
        assert_eq!(slot_for_distance(4), 4);
        assert_eq!(slot_for_distance(5), 4);
        assert_eq!(slot_for_distance(6), 5);
        assert_eq!(slot_for_distance(96), 13);
        assert_eq!(slot_for_distance(127), 13);
        assert_eq!(slot_for_distance(1 << 20), 40);
        assert_eq!(slot_for_distance(u32::MAX), 63);
    }
}
