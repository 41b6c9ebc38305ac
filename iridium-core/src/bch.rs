//! BCH syndrome tables and soft-decision (Chase-5) decoding.
//!
//! Four generator polynomials are in play:
//! - 3545: BCH(31,20) protecting IDA payload chunks, corrects up to 2 errors
//! - 29, 465, 41: the three LCW component codes
//!
//! Each polynomial gets a syndrome-to-error-locator table of size
//! `2^deg(poly)`, built once at first use and read-only after that.
//! Single-bit locators are entered first; two-bit locators only fill
//! indexes that are still unset. Index 0 always means "no error".

use std::sync::LazyLock;

use crate::bits::{bits_to_uint, gf2_remainder};

pub const IDA_POLY: u32 = 3545;
pub const LCW1_POLY: u32 = 29;
pub const LCW2_POLY: u32 = 465;
pub const LCW3_POLY: u32 = 41;

/// Codeword length of the IDA payload code.
pub const IDA_CODE_BITS: usize = 31;
/// Data bits carried per IDA codeword.
pub const IDA_DATA_BITS: usize = 20;

/// Number of least-reliable positions the Chase stage flips over.
const CHASE_POSITIONS: usize = 5;

// ---------------------------------------------------------------------------
// Syndrome tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct SyndromeEntry {
    errs: u8,
    locator: u32,
}

/// Precomputed syndrome-to-error-locator table for one polynomial.
pub struct SyndromeTable {
    poly: u32,
    entries: Vec<SyndromeEntry>,
}

impl SyndromeTable {
    /// Build the table for `poly` over codewords of `nbits` bits.
    pub fn build(poly: u32, nbits: u32, max_errors: u8) -> Self {
        let deg = 31 - poly.leading_zeros();
        let mut entries = vec![SyndromeEntry::default(); 1usize << deg];

        for b in 0..nbits {
            let e = 1u32 << b;
            let r = gf2_remainder(poly, e) as usize;
            if r != 0 && entries[r].errs == 0 {
                entries[r] = SyndromeEntry { errs: 1, locator: e };
            }
        }

        if max_errors >= 2 {
            for b1 in 0..nbits {
                for b2 in (b1 + 1)..nbits {
                    let e = (1u32 << b1) | (1u32 << b2);
                    let r = gf2_remainder(poly, e) as usize;
                    if r != 0 && entries[r].errs == 0 {
                        entries[r] = SyndromeEntry { errs: 2, locator: e };
                    }
                }
            }
        }

        SyndromeTable { poly, entries }
    }

    /// Decode `word`: returns the corrected word and the number of bit
    /// errors fixed, or `None` when the syndrome cannot be resolved.
    pub fn decode(&self, word: u32) -> Option<(u32, u8)> {
        let s = gf2_remainder(self.poly, word);
        if s == 0 {
            return Some((word, 0));
        }
        let entry = self.entries[s as usize];
        if entry.errs == 0 {
            return None;
        }
        Some((word ^ entry.locator, entry.errs))
    }
}

pub static IDA_TABLE: LazyLock<SyndromeTable> =
    LazyLock::new(|| SyndromeTable::build(IDA_POLY, IDA_CODE_BITS as u32, 2));
pub static LCW1_TABLE: LazyLock<SyndromeTable> =
    LazyLock::new(|| SyndromeTable::build(LCW1_POLY, 7, 2));
pub static LCW2_TABLE: LazyLock<SyndromeTable> =
    LazyLock::new(|| SyndromeTable::build(LCW2_POLY, 14, 2));
pub static LCW3_TABLE: LazyLock<SyndromeTable> =
    LazyLock::new(|| SyndromeTable::build(LCW3_POLY, 26, 2));

// ---------------------------------------------------------------------------
// BCH(31,20) block decode with Chase-5
// ---------------------------------------------------------------------------

/// Decode one 31-bit IDA payload block.
///
/// Standard table decode first; on failure, Chase-5 retries the table
/// decode with error patterns concentrated on the 5 least-reliable soft
/// positions. Without soft values a standard failure is final.
///
/// Returns the corrected 31-bit word and the total number of bits
/// flipped (table locator plus Chase trial pattern).
pub fn decode_block(bits: &[u8], llr: Option<&[f32]>) -> Option<(u32, u8)> {
    debug_assert_eq!(bits.len(), IDA_CODE_BITS);
    let word = bits_to_uint(bits, IDA_CODE_BITS);

    if let Some(hit) = IDA_TABLE.decode(word) {
        return Some(hit);
    }

    let llr = llr?;
    debug_assert_eq!(llr.len(), IDA_CODE_BITS);

    // Rank positions ascending by reliability, keep the 5 weakest.
    let mut order: Vec<usize> = (0..IDA_CODE_BITS).collect();
    order.sort_by(|&a, &b| {
        llr[a]
            .abs()
            .partial_cmp(&llr[b].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let weak = &order[..CHASE_POSITIONS];

    for mask in 1u32..(1 << CHASE_POSITIONS) {
        let mut trial = word;
        for (i, &pos) in weak.iter().enumerate() {
            if mask & (1 << i) != 0 {
                // bits[pos] is MSB-first within the 31-bit word
                trial ^= 1 << (IDA_CODE_BITS - 1 - pos);
            }
        }
        if let Some((fixed, errs)) = IDA_TABLE.decode(trial) {
            return Some((fixed, errs + mask.count_ones() as u8));
        }
    }

    None
}

/// Extract the 20 data bits from a corrected 31-bit codeword.
pub fn block_data(word: u32) -> u32 {
    word >> (IDA_CODE_BITS - IDA_DATA_BITS)
}

/// Systematic encode of a 20-bit message (test vectors and loopbacks).
pub fn encode_block(data: u32) -> u32 {
    let shifted = (data & 0xFFFFF) << (IDA_CODE_BITS - IDA_DATA_BITS);
    shifted | gf2_remainder(IDA_POLY, shifted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
