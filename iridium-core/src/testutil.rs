//! Wire-format encoders shared by the unit tests.
//!
//! These run the decode transforms backwards: tests build known-good
//! bursts, corrupt them where needed, and feed them to the real code.

use crate::bch;
use crate::bits::{bits_to_bytes, gf2_remainder, uint_to_bits};
use crate::crc::crc16_ccitt_false;
use crate::lcw::{DEINTERLEAVE, LCW_BITS};
use crate::types::{DemodFrame, Direction};

/// Encode an LCW into its 46 wire bits (pair-swapped and interleaved).
pub(crate) fn encode_lcw(ft: u8, lcw_ft: u8, lcw_code: u8, lcw3_val: u32) -> Vec<u8> {
    let s1 = (ft as u32 & 7) << 4;
    let cw1 = s1 | gf2_remainder(bch::LCW1_POLY, s1);

    let s2 = ((((lcw_ft & 3) << 4) | (lcw_code & 0xF)) as u32) << 8;
    let cw2 = s2 | gf2_remainder(bch::LCW2_POLY, s2);
    let tx2 = cw2 >> 1; // last codeword bit is not transmitted

    let s3 = (lcw3_val & 0x1FFFFF) << 5;
    let cw3 = s3 | gf2_remainder(bch::LCW3_POLY, s3);

    let mut lcw_bits = [0u8; LCW_BITS];
    uint_to_bits(cw1, &mut lcw_bits[0..7], 7);
    uint_to_bits(tx2, &mut lcw_bits[7..20], 13);
    uint_to_bits(cw3, &mut lcw_bits[20..46], 26);

    let mut swapped = [0u8; LCW_BITS];
    for (j, &dst) in DEINTERLEAVE.iter().enumerate() {
        swapped[dst - 1] = lcw_bits[j];
    }

    let mut wire = vec![0u8; LCW_BITS];
    for i in (0..LCW_BITS).step_by(2) {
        wire[i] = swapped[i + 1];
        wire[i + 1] = swapped[i];
    }
    wire
}

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

/// Interleave four 20-bit data words into one 124-bit wire block.
///
/// `data[0]` is the chunk the descrambler emits first.
pub(crate) fn interleave_block(data: &[u32; 4]) -> Vec<u8> {
    // wire chunk order [3, 1, 2, 0] maps emitted index -> combined chunk
    const PLACE: [usize; 4] = [3, 1, 2, 0];
    let mut combined = vec![0u8; 124];
    for (i, &d) in data.iter().enumerate() {
        let ci = PLACE[i];
        uint_to_bits(bch::encode_block(d), &mut combined[ci * 31..(ci + 1) * 31], 31);
    }

    let (idx1, idx2) = half_indexes(62);
    let mut wire = vec![0u8; 124];
    for (k, &pos) in idx1.iter().chain(idx2.iter()).enumerate() {
        wire[pos] = combined[k];
    }
    wire
}

/// Interleave two 20-bit data words into a 64-bit trailing partial block.
pub(crate) fn interleave_tail(data: &[u32; 2]) -> Vec<u8> {
    let mut gathered = vec![0u8; 62];
    uint_to_bits(bch::encode_block(data[0]), &mut gathered[0..31], 31);
    uint_to_bits(bch::encode_block(data[1]), &mut gathered[31..62], 31);

    let (idx1, idx2) = half_indexes(32);
    let mut order: Vec<usize> = Vec::new();
    order.extend(&idx2[1..]);
    order.extend(&idx1[1..]);

    let mut wire = vec![0u8; 64];
    for (k, &pos) in order.iter().enumerate() {
        wire[pos] = gathered[k];
    }
    wire
}

/// Build a 200-bit IDA stream (header, payload, CRC, slack) that passes
/// the burst CRC check.
pub(crate) fn build_ida_stream(cont: bool, da_ctr: u8, da_len: u8, payload: &[u8; 20]) -> Vec<u8> {
    let mut stream = vec![0u8; 200];
    stream[3] = u8::from(cont);
    uint_to_bits(da_ctr as u32, &mut stream[5..8], 3);
    uint_to_bits(da_len as u32, &mut stream[11..16], 5);
    for (i, &b) in payload.iter().enumerate() {
        uint_to_bits(b as u32, &mut stream[20 + i * 8..28 + i * 8], 8);
    }

    let mut crc_bits: Vec<u8> = stream[..20].to_vec();
    crc_bits.extend([0u8; 12]);
    crc_bits.extend(&stream[20..180]);
    let crc = crc16_ccitt_false(&bits_to_bytes(&crc_bits));
    uint_to_bits(crc as u32, &mut stream[180..196], 16);
    stream
}

/// Wrap a 200-bit IDA stream into full burst bits: unique word, IDA
/// LCW, and the interleaved payload.
pub(crate) fn build_burst_bits(stream: &[u8]) -> Vec<u8> {
    assert_eq!(stream.len(), 200);
    let chunk = |i: usize| crate::bits::bits_to_uint(&stream[i * 20..], 20);

    let mut bits = vec![0u8; 24]; // unique word, opaque to the decoder
    bits.extend(encode_lcw(2, 0, 0, 0));
    bits.extend(interleave_block(&[chunk(0), chunk(1), chunk(2), chunk(3)]));
    bits.extend(interleave_block(&[chunk(4), chunk(5), chunk(6), chunk(7)]));
    bits.extend(interleave_tail(&[chunk(8), chunk(9)]));
    bits
}

/// A complete CRC-valid IDA burst frame.
pub(crate) fn build_frame(
    cont: bool,
    da_ctr: u8,
    da_len: u8,
    payload: &[u8; 20],
    direction: Direction,
    timestamp_ns: u64,
    frequency_hz: u64,
) -> DemodFrame {
    let stream = build_ida_stream(cont, da_ctr, da_len, payload);
    let bits = build_burst_bits(&stream);
    let n_symbols = (bits.len() / 2) as u32;
    DemodFrame {
        id: 0,
        timestamp_ns,
        frequency_hz,
        direction,
        magnitude: 20.0,
        noise_db: -80.0,
        level: 0.01,
        confidence: 95,
        n_symbols,
        bits,
        llr: None,
    }
}

/// Payload of `len` bytes `base, base+1, ...` padded with zeros to 20.
pub(crate) fn counted_payload(base: u8, len: usize) -> [u8; 20] {
    let mut p = [0u8; 20];
    for (i, slot) in p.iter_mut().enumerate().take(len) {
        *slot = base.wrapping_add(i as u8);
    }
    p
}
