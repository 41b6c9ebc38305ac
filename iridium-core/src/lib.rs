//! iridium-core: Pure decode + reassembly library for Iridium L-band bursts.
//!
//! No async, no I/O — just algorithms. This crate is the shared core used by
//! the `iridium` CLI and by anyone slotting in their own QPSK front-end.
//!
//! Pipeline: `DemodFrame → IdaBurst → IdaMessage → SbdPacket → AcarsRecord`.

pub mod acars;
pub mod bch;
pub mod bits;
pub mod config;
pub mod crc;
pub mod descramble;
pub mod ida;
pub mod lcw;
pub mod lcwfmt;
pub mod output;
pub mod pipeline;
pub mod reassemble;
pub mod sbd;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types at crate root
pub use acars::AcarsRecord;
pub use ida::{decode_burst, IdaBurst};
pub use pipeline::{Event, Pipeline, PipelineStats};
pub use reassemble::IdaMessage;
pub use sbd::SbdPacket;
pub use types::*;
