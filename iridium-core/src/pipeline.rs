//! Long-lived pipeline context.
//!
//! Owns every piece of mutable decode state: the IDA chain table, the
//! SBD fragment table, and running counters. Syndrome and CRC tables
//! are process-wide statics touched once. One `push()` per burst,
//! zero or more events out; timeouts are evaluated against each
//! burst's own timestamp, and `flush()` exists for idle periods.

use crate::acars::{self, AcarsRecord};
use crate::ida::{decode_burst, IdaBurst};
use crate::reassemble::{IdaMessage, IdaReassembler};
use crate::sbd::{extract_mt_position, MtPosition, SbdExtractor, SbdPacket};
use crate::types::DemodFrame;

/// Everything the pipeline can emit for one input burst, in pipeline
/// order.
#[derive(Debug, Clone)]
pub enum Event {
    Burst(IdaBurst),
    Message(IdaMessage),
    MtPosition(MtPosition),
    Sbd(SbdPacket),
    Acars(AcarsRecord),
}

/// Running totals, surfaced at end of run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    pub frames: u64,
    /// Frames that produced no IDA burst (wrong type, FEC dead end,
    /// malformed header).
    pub rejected: u64,
    pub bursts: u64,
    pub crc_failures: u64,
    pub messages: u64,
    pub mt_positions: u64,
    pub sbd_packets: u64,
    pub acars_records: u64,
}

/// The decode pipeline. Single-threaded; owns all reassembly state.
pub struct Pipeline {
    ida: IdaReassembler,
    sbd: SbdExtractor,
    pub stats: PipelineStats,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline {
            ida: IdaReassembler::new(),
            sbd: SbdExtractor::new(),
            stats: PipelineStats::default(),
        }
    }

    /// Feed one demodulated burst through every stage.
    pub fn push(&mut self, frame: &DemodFrame) -> Vec<Event> {
        self.stats.frames += 1;
        self.flush(frame.timestamp_ns);

        let mut events = Vec::new();
        let burst = match decode_burst(frame) {
            Some(b) => b,
            None => {
                self.stats.rejected += 1;
                return events;
            }
        };
        self.stats.bursts += 1;
        if burst.da_len > 0 && !burst.crc_ok {
            self.stats.crc_failures += 1;
        }

        if let Some(msg) = self.ida.push(&burst) {
            self.stats.messages += 1;

            let position = extract_mt_position(&msg);
            let packet = self.sbd.push(&msg);

            events.push(Event::Message(msg));
            if let Some(pos) = position {
                self.stats.mt_positions += 1;
                events.push(Event::MtPosition(pos));
            }
            if let Some(pkt) = packet {
                self.stats.sbd_packets += 1;
                let record = acars::parse(&pkt);
                events.push(Event::Sbd(pkt));
                if let Some(rec) = record {
                    self.stats.acars_records += 1;
                    events.push(Event::Acars(rec));
                }
            }
        }

        events.insert(0, Event::Burst(burst));
        events
    }

    /// Expire reassembly chains against `now_ns` (sample time).
    pub fn flush(&mut self, now_ns: u64) {
        self.ida.flush(now_ns);
        self.sbd.flush(now_ns);
    }

    /// Chains currently held across both reassembly tables.
    pub fn active_chains(&self) -> (usize, usize) {
        (self.ida.active_chains(), self.sbd.active_chains())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
