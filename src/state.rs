//! Decoder state: probability tables, FSM registers, and size tracking.
//!
//! Everything the bitstream conditions on lives here, so LZMA2 chunk control
//! can reset or rebuild exactly the right parts: `reset` re-arms every
//! probability and register without touching allocations, `renew` swaps in
//! new literal-coder parameters (the only table whose size depends on them).

use crate::bit_tree::BitTree;
use crate::header::LzmaProps;
use crate::len_decoder::LenDecoder;
use crate::range_decoder::{Prob, PROB_INIT};

/// Number of states in the match/literal FSM.
pub(crate) const NUM_STATES: u32 = 12;

/// Bits of output position feeding `pos_state` (tables size `1 << 4` per
/// FSM state regardless of the stream's actual `pb`).
pub(crate) const NUM_POS_BITS_MAX: u32 = 4;

/// Length categories feeding distance-slot selection.
pub(crate) const NUM_LEN_TO_POS_STATES: u32 = 4;

/// Bits decoded by the align tree for large distances.
pub(crate) const NUM_ALIGN_BITS: u32 = 4;

/// Position slots below this index carry their distance footer in the
/// shared adaptive table; higher slots use direct bits plus align bits.
pub(crate) const END_POS_MODEL_INDEX: u32 = 14;

const NUM_FULL_DISTANCES: u32 = 1 << (END_POS_MODEL_INDEX >> 1);

/// Shared distance-footer table: `1 + 128 - 14` slots.
pub(crate) const POS_DECODERS_LEN: usize =
    (1 + NUM_FULL_DISTANCES - END_POS_MODEL_INDEX) as usize;

const POS_SLOT_BITS: u32 = 6;

/// Shortest encodable match.
pub(crate) const MATCH_MIN_LEN: u32 = 2;

/// Longest encodable match (`2 + 16 + 255`).
pub(crate) const MATCH_MAX_LEN: u32 = MATCH_MIN_LEN + 271;

/// Probabilities per literal sub-coder.
pub(crate) const LITERAL_CODER_SIZE: usize = 0x300;

const STATE_POS_LEN: usize = (NUM_STATES << NUM_POS_BITS_MAX) as usize;

#[inline]
pub(crate) fn state_after_literal(state: u32) -> u32 {
    if state < 4 {
        0
    } else if state < 10 {
        state - 3
    } else {
        state - 6
    }
}

#[inline]
pub(crate) fn state_after_match(state: u32) -> u32 {
    if state < 7 {
        7
    } else {
        10
    }
}

#[inline]
pub(crate) fn state_after_rep(state: u32) -> u32 {
    if state < 7 {
        8
    } else {
        11
    }
}

#[inline]
pub(crate) fn state_after_short_rep(state: u32) -> u32 {
    if state < 7 {
        9
    } else {
        11
    }
}

/// States below 7 mean the previous operation was a literal; literal
/// decoding in states 7 and up runs in matched mode.
#[inline]
pub(crate) fn is_literal_state(state: u32) -> bool {
    state < 7
}

fn literal_table_len(props: LzmaProps) -> usize {
    LITERAL_CODER_SIZE << (props.lc + props.lp)
}

/// Full decode state for one LZMA stream (or one LZMA2 chunk sequence).
pub(crate) struct LzmaState {
    pub(crate) props: LzmaProps,
    /// `(1 << pb) - 1`, masks the output position into `pos_state`.
    pub(crate) pos_mask: u32,
    /// `(1 << lp) - 1`, masks the output position into the literal state.
    pub(crate) lit_pos_mask: u32,

    pub(crate) lit_probs: Vec<Prob>,
    pub(crate) pos_slot: [BitTree; NUM_LEN_TO_POS_STATES as usize],
    pub(crate) align: BitTree,
    pub(crate) pos_decoders: [Prob; POS_DECODERS_LEN],
    pub(crate) is_match: [Prob; STATE_POS_LEN],
    pub(crate) is_rep: [Prob; NUM_STATES as usize],
    pub(crate) is_rep_g0: [Prob; NUM_STATES as usize],
    pub(crate) is_rep_g1: [Prob; NUM_STATES as usize],
    pub(crate) is_rep_g2: [Prob; NUM_STATES as usize],
    pub(crate) is_rep0_long: [Prob; STATE_POS_LEN],
    pub(crate) len: LenDecoder,
    pub(crate) rep_len: LenDecoder,

    pub(crate) state: u32,
    pub(crate) rep0: u32,
    pub(crate) rep1: u32,
    pub(crate) rep2: u32,
    pub(crate) rep3: u32,

    /// Bytes still owed to the declared unpack size. `u64::MAX` when the
    /// size is undefined; the unconditional decrements can never exhaust
    /// it in that case.
    pub(crate) bytes_left: u64,
    pub(crate) size_defined: bool,
    pub(crate) marker_mandatory: bool,
}

impl LzmaState {
    pub(crate) fn new(props: LzmaProps) -> Self {
        Self {
            props,
            pos_mask: (1 << props.pb) - 1,
            lit_pos_mask: (1 << props.lp) - 1,
            lit_probs: vec![PROB_INIT; literal_table_len(props)],
            pos_slot: std::array::from_fn(|_| BitTree::new(POS_SLOT_BITS)),
            align: BitTree::new(NUM_ALIGN_BITS),
            pos_decoders: [PROB_INIT; POS_DECODERS_LEN],
            is_match: [PROB_INIT; STATE_POS_LEN],
            is_rep: [PROB_INIT; NUM_STATES as usize],
            is_rep_g0: [PROB_INIT; NUM_STATES as usize],
            is_rep_g1: [PROB_INIT; NUM_STATES as usize],
            is_rep_g2: [PROB_INIT; NUM_STATES as usize],
            is_rep0_long: [PROB_INIT; STATE_POS_LEN],
            len: LenDecoder::new(),
            rep_len: LenDecoder::new(),
            state: 0,
            rep0: 0,
            rep1: 0,
            rep2: 0,
            rep3: 0,
            bytes_left: u64::MAX,
            size_defined: false,
            marker_mandatory: true,
        }
    }

    /// Re-arms every probability and FSM register, keeping allocations and
    /// format parameters. Size tracking is separate, see
    /// [`set_unpack_size`](Self::set_unpack_size).
    pub(crate) fn reset(&mut self) {
        self.lit_probs.fill(PROB_INIT);
        for tree in &mut self.pos_slot {
            tree.reset();
        }
        self.align.reset();
        self.pos_decoders.fill(PROB_INIT);
        self.is_match.fill(PROB_INIT);
        self.is_rep.fill(PROB_INIT);
        self.is_rep_g0.fill(PROB_INIT);
        self.is_rep_g1.fill(PROB_INIT);
        self.is_rep_g2.fill(PROB_INIT);
        self.is_rep0_long.fill(PROB_INIT);
        self.len.reset();
        self.rep_len.reset();
        self.state = 0;
        self.rep0 = 0;
        self.rep1 = 0;
        self.rep2 = 0;
        self.rep3 = 0;
    }

    /// Installs new literal-coder parameters, resizing the literal table if
    /// needed, then resets. Used by LZMA2 new-properties chunks.
    pub(crate) fn renew(&mut self, props: LzmaProps) {
        self.props = props;
        self.pos_mask = (1 << props.pb) - 1;
        self.lit_pos_mask = (1 << props.lp) - 1;
        self.lit_probs.resize(literal_table_len(props), PROB_INIT);
        self.reset();
    }

    /// Declares how many bytes this stream (or chunk) must produce.
    /// `None` means undefined: the stream must terminate with the in-band
    /// end marker.
    pub(crate) fn set_unpack_size(&mut self, unpack_size: Option<u64>) {
        match unpack_size {
            Some(size) => {
                self.bytes_left = size;
                self.size_defined = true;
                self.marker_mandatory = false;
            }
            None => {
                self.bytes_left = u64::MAX;
                self.size_defined = false;
                self.marker_mandatory = true;
            }
        }
    }
}
