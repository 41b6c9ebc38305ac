//! Link Control Word extraction.
//!
//! The 46 bits after the 24-bit unique word carry three interleaved BCH
//! codewords. Decoding:
//! 1. swap each adjacent bit pair (upstream demodulators deliver symbols
//!    reversed)
//! 2. apply the fixed 46-element de-interleave permutation
//! 3. decode the three component codewords; any unresolvable syndrome
//!    rejects the whole LCW
//!
//! Only `ft == 2` bursts continue into the IDA payload pipeline.

use serde::Serialize;

use crate::bch::{LCW1_TABLE, LCW2_TABLE, LCW3_TABLE};
use crate::bits::bits_to_uint;

/// Offset of the LCW within a demodulated burst.
pub const LCW_OFFSET: usize = 24;
/// LCW length in bits.
pub const LCW_BITS: usize = 46;

/// Wire de-interleave permutation, 1-indexed, applied after the pair swap.
pub(crate) const DEINTERLEAVE: [usize; LCW_BITS] = [
    39, 40, 25, 26, 11, 12, 37, 38, 23, 24, 9, 10, 35, 36, 21, 22, 7, 8, 33, 34, 19, 20, 5, 6, 31,
    32, 17, 18, 3, 4, 29, 30, 15, 16, 1, 2, 27, 28, 13, 14, 45, 46, 43, 44, 41, 42,
];

/// A decoded Link Control Word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lcw {
    /// Frame type; 2 selects the IDA payload path.
    pub ft: u8,
    /// LCW payload type, 0..=3.
    pub lcw_ft: u8,
    /// Sub-code within the payload type, 0..=15.
    pub lcw_code: u8,
    /// 21 data bits of the third component.
    pub lcw3_val: u32,
    /// How many of the three components needed a correction.
    pub ec_lcw: u8,
}

/// Decode the LCW from `bits` (the 46 bits following the unique word).
///
/// Returns `None` when any of the three component syndromes cannot be
/// resolved.
pub fn decode_lcw(bits: &[u8]) -> Option<Lcw> {
    if bits.len() < LCW_BITS {
        return None;
    }

    let mut swapped = [0u8; LCW_BITS];
    for i in (0..LCW_BITS).step_by(2) {
        swapped[i] = bits[i + 1];
        swapped[i + 1] = bits[i];
    }

    let mut lcw_bits = [0u8; LCW_BITS];
    for (j, &src) in DEINTERLEAVE.iter().enumerate() {
        lcw_bits[j] = swapped[src - 1];
    }

    let mut ec_lcw = 0u8;

    let (cw1, e1) = LCW1_TABLE.decode(bits_to_uint(&lcw_bits[0..7], 7))?;
    ec_lcw += u8::from(e1 > 0);

    // 13 transmitted bits are the 14-bit codeword minus its last bit
    let (cw2, e2) = LCW2_TABLE.decode(bits_to_uint(&lcw_bits[7..20], 13) << 1)?;
    ec_lcw += u8::from(e2 > 0);

    let (cw3, e3) = LCW3_TABLE.decode(bits_to_uint(&lcw_bits[20..46], 26))?;
    ec_lcw += u8::from(e3 > 0);

    let ft = ((cw1 >> 4) & 7) as u8;
    let lcw2_data = ((cw2 >> 8) & 0x3F) as u8;

    Some(Lcw {
        ft,
        lcw_ft: (lcw2_data >> 4) & 3,
        lcw_code: lcw2_data & 0xF,
        lcw3_val: cw3 >> 5,
        ec_lcw,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
