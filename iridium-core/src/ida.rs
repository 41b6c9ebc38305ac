//! IDA burst assembly: LCW gate, payload descramble, header parse, CRC.
//!
//! Stream layout (bits, after FEC): 20 header, 160 payload, 16 CRC,
//! then slack. The CRC-CCITT-FALSE input is the header, twelve zero
//! bits, and the payload; it must equal the stored 16 bits.

use serde::Serialize;

use crate::bits::{bits_to_bytes, bits_to_uint};
use crate::crc::crc16_ccitt_false;
use crate::descramble::descramble;
use crate::lcw::{decode_lcw, Lcw, LCW_BITS, LCW_OFFSET};
use crate::lcwfmt::format_lcw;
use crate::types::{DemodFrame, Direction};

/// Minimum decoded stream length carrying header + payload + CRC.
pub const MIN_STREAM_BITS: usize = 196;
/// Fixed payload size in bytes.
pub const PAYLOAD_BYTES: usize = 20;

/// A decoded IDA burst.
#[derive(Debug, Clone, Serialize)]
pub struct IdaBurst {
    pub id: u64,
    pub timestamp_ns: u64,
    pub frequency_hz: u64,
    pub direction: Direction,
    pub magnitude: f64,
    pub noise_db: f64,
    pub level: f64,
    pub confidence: u8,
    pub n_symbols: u32,

    pub lcw: Lcw,
    /// Canonical 111-char rendering of `lcw`.
    pub lcw_header: String,

    /// Continuation flag: more fragments follow.
    pub cont: bool,
    /// Fragment counter, 0..=7.
    pub da_ctr: u8,
    /// Used bytes in `payload`, 0..=20.
    pub da_len: u8,
    /// Header bits 16..20, rendered in diagnostics.
    pub zero_bits: u8,
    pub payload: [u8; PAYLOAD_BYTES],
    pub crc_computed: u16,
    pub crc_stored: u16,
    pub crc_ok: bool,

    /// Chunks that needed a nonzero FEC correction.
    pub fixederrs: u32,
    /// Full decoded stream, for trailing-bit diagnostics.
    pub bch_stream: Vec<u8>,
}

impl IdaBurst {
    /// Stream bits past the fixed header/payload/CRC layout.
    pub fn trailing_bits(&self) -> &[u8] {
        &self.bch_stream[MIN_STREAM_BITS.min(self.bch_stream.len())..]
    }

    /// Signal level in dB, floored at -99.99.
    pub fn level_db(&self) -> f64 {
        if self.level <= 0.0 {
            -99.99
        } else {
            20.0 * self.level.max(1e-5).log10()
        }
    }
}

/// Decode a demodulated burst into an IDA burst.
///
/// Returns `None` for anything that is not a CRC-checkable IDA burst:
/// short frames, unresolvable LCWs, non-IDA frame types, FEC dead ends,
/// and malformed headers. CRC mismatches are NOT rejected here — the
/// burst is returned with `crc_ok == false` so diagnostics can show it.
pub fn decode_burst(frame: &DemodFrame) -> Option<IdaBurst> {
    let bits = &frame.bits;
    if bits.len() < LCW_OFFSET + LCW_BITS {
        return None;
    }

    let lcw = decode_lcw(&bits[LCW_OFFSET..LCW_OFFSET + LCW_BITS])?;
    if lcw.ft != 2 {
        return None;
    }

    let payload_off = LCW_OFFSET + LCW_BITS;
    let soft = frame.has_soft();
    let decoded = descramble(
        &bits[payload_off..],
        frame.llr.as_deref().filter(|_| soft).map(|l| &l[payload_off..]),
    );
    let stream = decoded.stream;
    if stream.len() < MIN_STREAM_BITS {
        return None;
    }

    let cont = stream[3] == 1;
    let da_ctr = bits_to_uint(&stream[5..8], 3) as u8;
    let da_len = bits_to_uint(&stream[11..16], 5) as u8;
    let zero_bits = bits_to_uint(&stream[16..20], 4) as u8;
    if bits_to_uint(&stream[17..20], 3) != 0 {
        return None;
    }
    if da_len as usize > PAYLOAD_BYTES {
        return None;
    }

    let mut payload = [0u8; PAYLOAD_BYTES];
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte = bits_to_uint(&stream[20 + i * 8..28 + i * 8], 8) as u8;
    }

    let (crc_computed, crc_stored, crc_ok) = if da_len > 0 {
        let mut crc_bits: Vec<u8> = stream[..20].to_vec();
        crc_bits.extend([0u8; 12]);
        crc_bits.extend(&stream[20..180]);
        let computed = crc16_ccitt_false(&bits_to_bytes(&crc_bits));
        let stored = bits_to_uint(&stream[180..196], 16) as u16;
        (computed, stored, computed == stored)
    } else {
        (0, 0, false)
    };

    Some(IdaBurst {
        id: frame.id,
        timestamp_ns: frame.timestamp_ns,
        frequency_hz: frame.frequency_hz,
        direction: frame.direction,
        magnitude: frame.magnitude,
        noise_db: frame.noise_db,
        level: frame.level,
        confidence: frame.confidence,
        n_symbols: frame.n_symbols,
        lcw_header: format_lcw(&lcw),
        lcw,
        cont,
        da_ctr,
        da_len,
        zero_bits,
        payload,
        crc_computed,
        crc_stored,
        crc_ok,
        fixederrs: decoded.fixederrs,
        bch_stream: stream,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
