//! IDA payload descrambling.
//!
//! Payload bits after the LCW arrive as interleaved 124-bit blocks. Per
//! block:
//! 1. de-interleave the 62 two-bit symbols into two 62-bit halves
//! 2. concatenate the halves and split into four 31-bit chunks, decoded
//!    in the wire order `[3, 1, 2, 0]`
//! 3. BCH(31,20)-decode each chunk (Chase-5 assisted when soft values
//!    are present); the first unrecoverable chunk ends the burst
//!
//! A trailing partial block of at least 4 bits is de-interleaved the
//! same way, except the first bit of each half is dropped and the
//! halves are joined second-first. Both quirks are wire format.

use crate::bch;

/// Interleaved block size in bits.
pub const BLOCK_BITS: usize = 124;

/// Chunk processing order within a de-interleaved block.
const CHUNK_ORDER: [usize; 4] = [3, 1, 2, 0];

/// Descrambler output: the concatenated decoded data bits.
#[derive(Debug, Clone, Default)]
pub struct Descrambled {
    /// Decoded data bits, 20 per successfully decoded chunk.
    pub stream: Vec<u8>,
    /// Number of chunks that needed a nonzero correction.
    pub fixederrs: u32,
}

/// Bit indexes of the two de-interleave halves for `nsym` symbols.
///
/// The first half walks symbols from the top index down in steps of
/// two; the second half starts one below.
fn half_indexes(nsym: usize) -> (Vec<usize>, Vec<usize>) {
    let walk = |start: isize| {
        let mut idx = Vec::new();
        let mut s = start;
        while s >= 0 {
            idx.push(2 * s as usize);
            idx.push(2 * s as usize + 1);
            s -= 2;
        }
        idx
    };
    (walk(nsym as isize - 1), walk(nsym as isize - 2))
}

fn gather<T: Copy>(src: &[T], idx: &[usize]) -> Vec<T> {
    idx.iter().map(|&i| src[i]).collect()
}

/// Descramble `bits` (optionally with aligned soft values) into the
/// decoded BCH data stream.
pub fn descramble(bits: &[u8], llr: Option<&[f32]>) -> Descrambled {
    let mut out = Descrambled::default();
    let mut off = 0;

    while bits.len() - off >= BLOCK_BITS {
        let block = &bits[off..off + BLOCK_BITS];
        let block_llr = llr.map(|l| &l[off..off + BLOCK_BITS]);

        let (idx1, idx2) = half_indexes(BLOCK_BITS / 2);
        let mut combined = gather(block, &idx1);
        combined.extend(gather(block, &idx2));
        let combined_llr = block_llr.map(|l| {
            let mut c = gather(l, &idx1);
            c.extend(gather(l, &idx2));
            c
        });

        for &ci in &CHUNK_ORDER {
            let chunk = &combined[ci * 31..(ci + 1) * 31];
            let chunk_llr = combined_llr.as_deref().map(|l| &l[ci * 31..(ci + 1) * 31]);
            match bch::decode_block(chunk, chunk_llr) {
                Some((word, errs)) => {
                    if errs > 0 {
                        out.fixederrs += 1;
                    }
                    push_data_bits(&mut out.stream, bch::block_data(word));
                }
                None => return out,
            }
        }
        off += BLOCK_BITS;
    }

    let remain = bits.len() - off;
    if remain >= 4 {
        descramble_tail(&bits[off..], llr.map(|l| &l[off..]), &mut out);
    }

    out
}

/// Decode the trailing partial block.
fn descramble_tail(bits: &[u8], llr: Option<&[f32]>, out: &mut Descrambled) {
    let nsym = bits.len() / 2;
    let (idx1, idx2) = half_indexes(nsym);

    // first bit of each half is dropped, halves join second-first
    let mut order: Vec<usize> = Vec::with_capacity(idx1.len() + idx2.len() - 2);
    order.extend(&idx2[1..]);
    order.extend(&idx1[1..]);

    let combined = gather(bits, &order);
    let combined_llr = llr.map(|l| gather(l, &order));

    let mut off = 0;
    while combined.len() - off >= 31 {
        let chunk = &combined[off..off + 31];
        let chunk_llr = combined_llr.as_deref().map(|l| &l[off..off + 31]);
        match bch::decode_block(chunk, chunk_llr) {
            Some((word, errs)) => {
                if errs > 0 {
                    out.fixederrs += 1;
                }
                push_data_bits(&mut out.stream, bch::block_data(word));
            }
            None => return,
        }
        off += 31;
    }
}

fn push_data_bits(stream: &mut Vec<u8>, data: u32) {
    for i in (0..bch::IDA_DATA_BITS).rev() {
        stream.push(((data >> i) & 1) as u8);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
