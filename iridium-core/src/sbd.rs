//! Short-Burst-Data extraction from reassembled IDA messages.
//!
//! SBD rides inside IDA messages behind two marker families:
//! - `0x76 xx` data packets (typ1 range depends on link direction)
//! - `0x06 00 xx` hello packets
//!
//! Payloads longer than one packet arrive as `msgcnt` fragments that
//! are stitched back together in an 8-slot table with a 5 second
//! timeout. `0x06 05` messages carry an MT position block instead.

use serde::Serialize;

use crate::reassemble::IdaMessage;
use crate::types::Direction;

/// Maximum tracked SBD chains.
pub const SBD_SLOTS: usize = 8;
/// Chain timeout.
pub const SBD_TIMEOUT_NS: u64 = 5_000_000_000;
/// Accumulated payload cap per chain.
pub const SBD_MAX_DATA: usize = 1024;

/// A complete SBD payload.
#[derive(Debug, Clone, Serialize)]
pub struct SbdPacket {
    pub data: Vec<u8>,
    pub direction: Direction,
    pub timestamp_ns: u64,
    pub frequency_hz: u64,
    pub magnitude: f64,
}

// ---------------------------------------------------------------------------
// Packet-level extraction
// ---------------------------------------------------------------------------

struct Extracted {
    payload: Vec<u8>,
    /// Total fragments, or -1 when the packet type does not carry one.
    msgcnt: i32,
    /// Fragment number, 0 for counter-less one-shots.
    msgno: i32,
}

fn is_sbd(data: &[u8], direction: Direction) -> bool {
    if data.len() < 3 {
        return false;
    }
    match data[0] {
        0x76 if data[1] != 5 => match direction {
            Direction::Downlink => (0x08..=0x0B).contains(&data[1]),
            Direction::Uplink => (0x0C..=0x0E).contains(&data[1]),
            Direction::Unknown => false,
        },
        0x06 => data[1] == 0x00 && matches!(data[2], 0x00 | 0x10 | 0x20 | 0x40 | 0x50 | 0x70),
        _ => false,
    }
}

fn extract(msg: &IdaMessage) -> Option<Extracted> {
    let data = &msg.data;
    if !is_sbd(data, msg.direction) {
        return None;
    }
    let typ1 = data[1];
    let mut rest = &data[2..];

    if data[0] == 0x06 {
        // hello packet: fixed pre-header, payload starts at byte 29
        if rest.len() < 30 || rest[0] != 0x20 {
            return None;
        }
        let msgcnt = rest[15] as i32;
        let msgno = i32::from(msgcnt != 0);
        return Some(Extracted {
            payload: rest[29..].to_vec(),
            msgcnt,
            msgno,
        });
    }

    let mut msgcnt = -1i32;
    if typ1 == 0x08 {
        // downlink data packet: short or long pre-header
        let pre = if rest[0] == 0x20 { 5 } else { 7 };
        if rest.len() <= 3 || rest.len() < pre {
            return None;
        }
        msgcnt = rest[3] as i32;
        rest = &rest[pre..];
    } else if msg.direction == Direction::Uplink
        && !rest.is_empty()
        && (rest[0] == 0x50 || rest[0] == 0x51)
    {
        // uplink ack/nak marker
        if rest.len() < 3 {
            return None;
        }
        rest = &rest[3..];
    }

    // data header: 0x10, length, fragment number
    if rest.len() >= 3 && rest[0] == 0x10 {
        let len = rest[1] as usize;
        let msgno = rest[2] as i32;
        if rest.len() < 3 + len {
            return None;
        }
        return Some(Extracted {
            payload: rest[3..3 + len].to_vec(),
            msgcnt,
            msgno,
        });
    }

    None
}

// ---------------------------------------------------------------------------
// MT position (0x06 05 ring messages)
// ---------------------------------------------------------------------------

/// ECEF position carried by an MT ring message.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MtPosition {
    pub x_km: i32,
    pub y_km: i32,
    pub z_km: i32,
    pub radius_km: f64,
    pub timestamp_ns: u64,
    pub frequency_hz: u64,
    pub direction: Direction,
}

fn sign_extend_12(v: u32) -> i32 {
    ((v as i32) << 20) >> 20
}

/// Extract the position block from a `0x06 05` message.
///
/// The 5-byte block at offset 37 (behind the 0x1B marker) packs three
/// 12-bit two's-complement coordinates in units of 4 km. Positions
/// whose radius falls outside 5000..7000 km are discarded as noise.
pub fn extract_mt_position(msg: &IdaMessage) -> Option<MtPosition> {
    let d = &msg.data;
    if d.len() < 42 || d[0] != 0x06 || d[1] != 0x05 {
        return None;
    }
    if d[36] != 0x1B {
        return None;
    }

    let mut block = 0u64;
    for &b in &d[37..42] {
        block = (block << 8) | b as u64;
    }
    let x_km = sign_extend_12(((block >> 28) & 0xFFF) as u32) * 4;
    let y_km = sign_extend_12(((block >> 16) & 0xFFF) as u32) * 4;
    let z_km = sign_extend_12(((block >> 4) & 0xFFF) as u32) * 4;

    let radius_km = ((x_km as f64).powi(2) + (y_km as f64).powi(2) + (z_km as f64).powi(2)).sqrt();
    if !(5000.0..=7000.0).contains(&radius_km) {
        return None;
    }

    Some(MtPosition {
        x_km,
        y_km,
        z_km,
        radius_km,
        timestamp_ns: msg.timestamp_ns,
        frequency_hz: msg.frequency_hz,
        direction: msg.direction,
    })
}

// ---------------------------------------------------------------------------
// Multi-packet reassembly
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct SbdSlot {
    active: bool,
    msgno: i32,
    msgcnt: i32,
    direction: Direction,
    last_timestamp_ns: u64,
    frequency_hz: u64,
    magnitude: f64,
    data: Vec<u8>,
}

impl SbdSlot {
    fn empty() -> Self {
        SbdSlot {
            active: false,
            msgno: 0,
            msgcnt: 0,
            direction: Direction::Unknown,
            last_timestamp_ns: 0,
            frequency_hz: 0,
            magnitude: 0.0,
            data: Vec::new(),
        }
    }
}

/// SBD packet extractor and 8-slot fragment table.
pub struct SbdExtractor {
    slots: Vec<SbdSlot>,
}

impl SbdExtractor {
    pub fn new() -> Self {
        SbdExtractor {
            slots: (0..SBD_SLOTS).map(|_| SbdSlot::empty()).collect(),
        }
    }

    pub fn active_chains(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }

    /// Feed one IDA message; returns a complete SBD payload when one
    /// closes.
    pub fn push(&mut self, msg: &IdaMessage) -> Option<SbdPacket> {
        let ext = extract(msg)?;

        // counter-less or single-packet payloads dispatch immediately
        if ext.msgno == 0 || (ext.msgcnt <= 1 && ext.msgno == 1) {
            return Some(SbdPacket {
                data: ext.payload,
                direction: msg.direction,
                timestamp_ns: msg.timestamp_ns,
                frequency_hz: msg.frequency_hz,
                magnitude: msg.magnitude,
            });
        }

        if ext.msgcnt > 1 && ext.msgno == 1 {
            // leading fragment
            let i = self.allocate();
            let slot = &mut self.slots[i];
            slot.active = true;
            slot.msgno = 1;
            slot.msgcnt = ext.msgcnt;
            slot.direction = msg.direction;
            slot.last_timestamp_ns = msg.timestamp_ns;
            slot.frequency_hz = msg.frequency_hz;
            slot.magnitude = msg.magnitude;
            slot.data = ext.payload;
            slot.data.truncate(SBD_MAX_DATA);
            return None;
        }

        if ext.msgno > 1 {
            let i = self.slots.iter().position(|s| {
                s.active && s.direction == msg.direction && s.msgno + 1 == ext.msgno
            })?;
            let slot = &mut self.slots[i];
            let room = SBD_MAX_DATA - slot.data.len();
            slot.data.extend(&ext.payload[..ext.payload.len().min(room)]);
            slot.msgno = ext.msgno;
            slot.last_timestamp_ns = msg.timestamp_ns;
            if slot.msgno == slot.msgcnt {
                slot.active = false;
                return Some(SbdPacket {
                    data: std::mem::take(&mut slot.data),
                    direction: slot.direction,
                    timestamp_ns: msg.timestamp_ns,
                    frequency_hz: slot.frequency_hz,
                    magnitude: slot.magnitude,
                });
            }
        }
        None
    }

    /// Drop chains idle past the timeout.
    pub fn flush(&mut self, now_ns: u64) {
        for slot in &mut self.slots {
            if slot.active && now_ns.saturating_sub(slot.last_timestamp_ns) > SBD_TIMEOUT_NS {
                slot.active = false;
                slot.data.clear();
            }
        }
    }

    fn allocate(&mut self) -> usize {
        if let Some(i) = self.slots.iter().position(|s| !s.active) {
            return i;
        }
        let i = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.last_timestamp_ns)
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.slots[i].data.clear();
        i
    }
}

impl Default for SbdExtractor {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
