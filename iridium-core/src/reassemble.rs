//! Multi-burst IDA reassembly.
//!
//! Bursts that belong together share a direction, sit within 260 Hz and
//! 280 ms of each other, and carry consecutive fragment counters mod 8.
//! At most 16 chains are tracked; a new chain evicts the stalest slot
//! when the table is full. Only CRC-verified bursts with payload are
//! admitted.

use crate::ida::IdaBurst;
use crate::types::Direction;

/// Maximum tracked chains.
pub const IDA_SLOTS: usize = 16;
/// Maximum gap between consecutive fragments.
pub const IDA_TIMEOUT_NS: u64 = 280_000_000;
/// Frequency drift tolerance between fragments.
pub const IDA_FREQ_WINDOW_HZ: u64 = 260;
/// Accumulated payload cap per chain (8 full fragments).
pub const IDA_MAX_DATA: usize = 160;

/// A reassembled IDA message.
#[derive(Debug, Clone)]
pub struct IdaMessage {
    pub data: Vec<u8>,
    /// Timestamp of the final fragment.
    pub timestamp_ns: u64,
    /// Frequency of the first fragment.
    pub frequency_hz: u64,
    pub direction: Direction,
    pub magnitude: f64,
}

#[derive(Debug, Clone)]
struct Slot {
    active: bool,
    direction: Direction,
    frequency_hz: u64,
    last_timestamp_ns: u64,
    last_ctr: u8,
    magnitude: f64,
    data: Vec<u8>,
}

impl Slot {
    fn empty() -> Self {
        Slot {
            active: false,
            direction: Direction::Unknown,
            frequency_hz: 0,
            last_timestamp_ns: 0,
            last_ctr: 0,
            magnitude: 0.0,
            data: Vec::new(),
        }
    }
}

/// 16-slot chain table. Owned by exactly one pipeline thread.
pub struct IdaReassembler {
    slots: Vec<Slot>,
}

impl IdaReassembler {
    pub fn new() -> Self {
        IdaReassembler {
            slots: (0..IDA_SLOTS).map(|_| Slot::empty()).collect(),
        }
    }

    /// Number of chains currently being assembled.
    pub fn active_chains(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }

    /// Feed one burst; returns a completed message when a chain closes.
    pub fn push(&mut self, burst: &IdaBurst) -> Option<IdaMessage> {
        if !burst.crc_ok || burst.da_len == 0 {
            return None;
        }
        let fragment = &burst.payload[..burst.da_len as usize];

        // continuation of an existing chain?
        if let Some(i) = self.find_match(burst) {
            let slot = &mut self.slots[i];
            let room = IDA_MAX_DATA - slot.data.len();
            slot.data.extend(&fragment[..fragment.len().min(room)]);
            slot.last_timestamp_ns = burst.timestamp_ns;
            slot.last_ctr = burst.da_ctr;
            if burst.cont {
                return None;
            }
            let slot = &mut self.slots[i];
            slot.active = false;
            return Some(IdaMessage {
                data: std::mem::take(&mut slot.data),
                timestamp_ns: burst.timestamp_ns,
                frequency_hz: slot.frequency_hz,
                direction: slot.direction,
                magnitude: slot.magnitude,
            });
        }

        if burst.da_ctr != 0 {
            // orphan continuation fragment
            return None;
        }

        if !burst.cont {
            // complete single-burst message
            return Some(IdaMessage {
                data: fragment.to_vec(),
                timestamp_ns: burst.timestamp_ns,
                frequency_hz: burst.frequency_hz,
                direction: burst.direction,
                magnitude: burst.magnitude,
            });
        }

        // leading fragment of a new chain
        let i = self.allocate();
        let slot = &mut self.slots[i];
        slot.active = true;
        slot.direction = burst.direction;
        slot.frequency_hz = burst.frequency_hz;
        slot.last_timestamp_ns = burst.timestamp_ns;
        slot.last_ctr = 0;
        slot.magnitude = burst.magnitude;
        slot.data = fragment.to_vec();
        None
    }

    /// Drop chains whose last fragment is older than the timeout.
    pub fn flush(&mut self, now_ns: u64) {
        for slot in &mut self.slots {
            if slot.active && now_ns.saturating_sub(slot.last_timestamp_ns) > IDA_TIMEOUT_NS {
                slot.active = false;
                slot.data.clear();
            }
        }
    }

    fn find_match(&self, burst: &IdaBurst) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.active
                && s.direction == burst.direction
                && s.frequency_hz.abs_diff(burst.frequency_hz) <= IDA_FREQ_WINDOW_HZ
                && burst.timestamp_ns >= s.last_timestamp_ns
                && burst.timestamp_ns - s.last_timestamp_ns <= IDA_TIMEOUT_NS
                && (s.last_ctr + 1) % 8 == burst.da_ctr
        })
    }

    /// Free slot index, or the stalest active slot when full.
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

impl Default for IdaReassembler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
