//! Shared types, error enum, and the demodulated-burst input record.

use serde::Serialize;
use thiserror::Error;

/// All errors produced by iridium-core.
#[derive(Debug, Error)]
pub enum IridiumError {
    #[error("malformed burst line: {0}")]
    MalformedLine(String),
    #[error("invalid frame: expected at least {expected} bits, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("publish error: {0}")]
    Publish(String),
}

pub type Result<T> = std::result::Result<T, IridiumError>;

// ---------------------------------------------------------------------------
// Link direction
// ---------------------------------------------------------------------------

/// Which side of the link a burst was received from.
///
/// Decided by the front-end from which 12-symbol access code matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Unknown,
    Uplink,
    Downlink,
}

impl Direction {
    /// Two-character tag used in line-oriented output.
    pub fn tag(&self) -> &'static str {
        match self {
            Direction::Unknown => "??",
            Direction::Uplink => "UL",
            Direction::Downlink => "DL",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Unknown => write!(f, "unknown"),
            Direction::Uplink => write!(f, "uplink"),
            Direction::Downlink => write!(f, "downlink"),
        }
    }
}

// ---------------------------------------------------------------------------
// SDR backend interface types
// ---------------------------------------------------------------------------

/// Raw sample encoding delivered by an SDR backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Int8,
    Float,
}

/// One buffer of raw I/Q samples from an SDR backend.
///
/// The core never interprets samples; this type exists so a substitute
/// front-end has a stable hand-off shape.
#[derive(Debug, Clone)]
pub struct SampleBuf {
    /// Number of complex samples in `data`.
    pub num: usize,
    pub format: SampleFormat,
    /// Hardware timestamp in nanoseconds; `None` when the radio has none.
    pub hw_timestamp_ns: Option<u64>,
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Demodulated burst (pipeline input)
// ---------------------------------------------------------------------------

/// A single demodulated burst from the QPSK front-end.
///
/// `bits` starts with the 24-bit unique word; `llr`, when present, is
/// aligned with `bits` (larger magnitude = more confident, sign agrees
/// with the hard bit).
#[derive(Debug, Clone)]
pub struct DemodFrame {
    /// Monotonic burst counter from the front-end.
    pub id: u64,
    /// Monotonic nanosecond timestamp.
    pub timestamp_ns: u64,
    /// Center frequency in Hz.
    pub frequency_hz: u64,
    pub direction: Direction,
    pub magnitude: f64,
    /// Noise floor estimate in dB.
    pub noise_db: f64,
    /// Linear signal level.
    pub level: f64,
    /// Demodulator confidence, 0..=100.
    pub confidence: u8,
    /// Number of payload symbols seen by the demodulator.
    pub n_symbols: u32,
    /// Hard bits, one byte per bit (0 or 1).
    pub bits: Vec<u8>,
    /// Optional soft values aligned with `bits`.
    pub llr: Option<Vec<f32>>,
}

impl DemodFrame {
    /// True when soft values are present and aligned with the bit buffer.
    pub fn has_soft(&self) -> bool {
        self.llr.as_ref().is_some_and(|l| l.len() == self.bits.len())
    }

    /// Signal level in dB, floored at -99.99 for non-positive levels.
    pub fn level_db(&self) -> f64 {
        if self.level <= 0.0 {
            -99.99
        } else {
            20.0 * self.level.max(1e-5).log10()
        }
    }
}

// ---------------------------------------------------------------------------
// Small shared helpers
// ---------------------------------------------------------------------------

/// Render bytes as printable ASCII, one char per byte, '.' for the rest.
pub fn printable(data: &[u8]) -> String {
    data.iter()
        .map(|&b| {
            if (0x20..0x7F).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Encode bytes as lowercase hex.
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_tags() {
        assert_eq!(Direction::Uplink.tag(), "UL");
        assert_eq!(Direction::Downlink.tag(), "DL");
        assert_eq!(Direction::Unknown.tag(), "??");
    }

    #[test]
    fn test_printable() {
        assert_eq!(printable(b"AB\x01\x7fC"), "AB..C");
        assert_eq!(printable(b""), "");
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0xDE, 0xAD, 0x01]), "dead01");
    }

    #[test]
    fn test_level_db_floor() {
        let mut frame = DemodFrame {
            id: 0,
            timestamp_ns: 0,
            frequency_hz: 1_626_000_000,
            direction: Direction::Downlink,
            magnitude: 0.0,
            noise_db: -80.0,
            level: 0.0,
            confidence: 0,
            n_symbols: 0,
            bits: Vec::new(),
            llr: None,
        };
        assert_eq!(frame.level_db(), -99.99);
        frame.level = 1.0;
        assert_eq!(frame.level_db(), 0.0);
    }

    #[test]
    fn test_has_soft_alignment() {
        let frame = DemodFrame {
            id: 0,
            timestamp_ns: 0,
            frequency_hz: 0,
            direction: Direction::Unknown,
            magnitude: 0.0,
            noise_db: 0.0,
            level: 1.0,
            confidence: 100,
            n_symbols: 2,
            bits: vec![0, 1, 1, 0],
            llr: Some(vec![1.0, -2.0, 3.0]),
        };
        assert!(!frame.has_soft(), "misaligned soft values must not count");
    }
}
