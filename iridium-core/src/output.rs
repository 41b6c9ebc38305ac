//! Line and JSON serializers over the pipeline's records.
//!
//! All functions are deterministic: identical records (and an identical
//! wall-clock anchor) produce byte-identical output. Lines are returned
//! without a trailing newline; sinks append their own framing.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::acars::AcarsRecord;
use crate::ida::{IdaBurst, PAYLOAD_BYTES};
use crate::sbd::MtPosition;
use crate::types::{printable, DemodFrame};

/// Width of the IDA payload hex field.
const HEX_FIELD_WIDTH: usize = 60;

// ---------------------------------------------------------------------------
// ACARS wall-clock anchor
// ---------------------------------------------------------------------------

/// Projects monotonic burst timestamps onto the wall clock.
///
/// The first projected message pins its monotonic timestamp to an
/// anchor instant; later messages are offset by their nanosecond delta.
pub struct AcarsClock {
    wall_anchor: Option<DateTime<Utc>>,
    mono_anchor_ns: Option<u64>,
}

impl AcarsClock {
    /// Anchor to the wall clock at first use.
    pub fn new() -> Self {
        AcarsClock {
            wall_anchor: None,
            mono_anchor_ns: None,
        }
    }

    /// Anchor to a fixed instant (reproducible output).
    pub fn with_anchor(wall: DateTime<Utc>) -> Self {
        AcarsClock {
            wall_anchor: Some(wall),
            mono_anchor_ns: None,
        }
    }

    fn project(&mut self, ts_ns: u64) -> DateTime<Utc> {
        let wall = *self.wall_anchor.get_or_insert_with(Utc::now);
        let mono = *self.mono_anchor_ns.get_or_insert(ts_ns);
        wall + Duration::nanoseconds(ts_ns.saturating_sub(mono) as i64)
    }
}

impl Default for AcarsClock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ACARS JSON document
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct SourceInfo {
    pub transport: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AcarsBody {
    /// ISO-8601 UTC, second resolution.
    pub timestamp: String,
    pub errors: u32,
    pub link_direction: String,
    /// False when the message ended with ETB (more blocks follow).
    pub block_end: bool,
    pub mode: String,
    pub tail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<String>,
    pub label: String,
    pub block_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AcarsJson {
    pub app: AppInfo,
    pub source: SourceInfo,
    pub acars: AcarsBody,
    /// Frequency in MHz.
    pub freq: f64,
    pub level: f64,
    /// Opaque header bytes as hex, empty when absent.
    pub header: String,
}

// ---------------------------------------------------------------------------
// Formatter
// ---------------------------------------------------------------------------

/// Renders pipeline records into their canonical textual forms.
pub struct Formatter {
    /// Capture label printed in RAW and IDA lines.
    pub source: String,
    /// Station id for ACARS JSON output.
    pub station_id: Option<String>,
    clock: AcarsClock,
}

impl Formatter {
    pub fn new(source: impl Into<String>, station_id: Option<String>) -> Self {
        Formatter {
            source: source.into(),
            station_id,
            clock: AcarsClock::new(),
        }
    }

    /// As [`Formatter::new`], with a fixed ACARS anchor.
    pub fn with_clock(source: impl Into<String>, station_id: Option<String>, clock: AcarsClock) -> Self {
        Formatter {
            source: source.into(),
            station_id,
            clock,
        }
    }

    /// RAW line for a demodulated burst.
    pub fn raw_line(&self, frame: &DemodFrame) -> String {
        let bits: String = frame.bits.iter().map(|&b| if b == 1 { '1' } else { '0' }).collect();
        format!(
            "RAW: {} {:.4} {:010} N:{:05.2}{:+06.2} I:{:011} {:3}% {:.5} {:3} {}",
            self.source,
            frame.timestamp_ns as f64 / 1e6,
            frame.frequency_hz,
            frame.magnitude,
            frame.noise_db,
            frame.id,
            frame.confidence,
            frame.level,
            frame.n_symbols,
            bits
        )
    }

    /// Parsed IDA burst line.
    pub fn ida_line(&self, burst: &IdaBurst) -> String {
        let level_db = burst.level_db();
        let snr = level_db - burst.noise_db;

        let mut line = format!(
            "IDA: {} {:014.4} {:010} {:3}% {:06.2}|{:+07.2}|{:05.2} {:3} {} {}",
            self.source,
            burst.timestamp_ns as f64 / 1e6,
            burst.frequency_hz,
            burst.confidence,
            level_db,
            burst.noise_db,
            snr,
            burst.n_symbols,
            burst.direction.tag(),
            burst.lcw_header,
        );

        line.push_str(&format!(
            "cont={} ctr={} len={:02} 0:{:04b} ",
            u8::from(burst.cont),
            burst.da_ctr,
            burst.da_len,
            burst.zero_bits
        ));

        line.push_str(&hex_field(&burst.payload, burst.da_len as usize));

        if burst.da_len > 0 {
            if burst.crc_ok {
                line.push_str("CRC:OK ");
            } else {
                line.push_str(&format!(
                    "CRC:BAD({:04x}/{:04x}) ",
                    burst.crc_computed, burst.crc_stored
                ));
            }
        } else {
            line.push_str("CRC:--- ");
        }

        let trailing = burst.trailing_bits();
        if !trailing.is_empty() {
            let t: String = trailing.iter().map(|&b| if b == 1 { '1' } else { '0' }).collect();
            line.push_str(&t);
            line.push(' ');
        }

        line.push_str(&printable(&burst.payload));
        line
    }

    /// Lenient single-line ACARS rendering.
    pub fn acars_text(&self, rec: &AcarsRecord) -> String {
        let mut line = format!(
            "ACARS: {:014.4} {:010} {:05.2} {} M:{} R:{:<7} A:{} L:{:<2} B:{}",
            rec.timestamp_ns as f64 / 1e6,
            rec.frequency_hz,
            rec.magnitude,
            rec.direction.tag(),
            rec.mode,
            rec.registration,
            rec.ack,
            rec.label,
            rec.block_id
        );
        if let (Some(seq), Some(flight)) = (&rec.sequence, &rec.flight_no) {
            line.push_str(&format!(" S:{seq} F:{flight}"));
        }
        if rec.errors > 0 {
            line.push_str(&format!(" ERRORS:{}", rec.errors));
        }
        if rec.continuation {
            line.push_str(" CONT'd");
        }
        if !rec.text.is_empty() {
            line.push(' ');
            line.push_str(&rec.text);
        }
        line
    }

    /// Strict ACARS JSON document; `None` drops records with errors.
    pub fn acars_json(&mut self, rec: &AcarsRecord) -> Option<AcarsJson> {
        if rec.errors > 0 {
            return None;
        }
        let timestamp = self
            .clock
            .project(rec.timestamp_ns)
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();

        Some(AcarsJson {
            app: AppInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            source: SourceInfo {
                transport: "iridium".to_string(),
                protocol: "acars".to_string(),
                station_id: self.station_id.clone(),
            },
            acars: AcarsBody {
                timestamp,
                errors: rec.errors,
                link_direction: rec.direction.to_string(),
                block_end: !rec.continuation,
                mode: rec.mode.to_string(),
                tail: rec.registration.clone(),
                ack: if rec.ack == '!' {
                    None
                } else {
                    Some(rec.ack.to_string())
                },
                label: rec.label.clone(),
                block_id: rec.block_id.to_string(),
                message_number: rec.sequence.clone(),
                flight: rec.flight_no.clone(),
                text: if rec.text.is_empty() {
                    None
                } else {
                    Some(rec.text.clone())
                },
            },
            freq: burst_freq_mhz(rec.frequency_hz),
            level: rec.magnitude,
            header: rec
                .header
                .map(|h| crate::types::hex_encode(&h))
                .unwrap_or_default(),
        })
    }

    /// Diagnostic line for an MT position fix.
    pub fn mtp_line(&self, pos: &MtPosition) -> String {
        format!(
            "MTP: {:014.4} {:010} {} xyz=({},{},{})km r={:.1}km",
            pos.timestamp_ns as f64 / 1e6,
            pos.frequency_hz,
            pos.direction.tag(),
            pos.x_km,
            pos.y_km,
            pos.z_km,
            pos.radius_km
        )
    }
}

fn burst_freq_mhz(hz: u64) -> f64 {
    hz as f64 / 1e6
}

/// Payload hex, dot-separated, padded to a fixed width. The separator
/// at the used-length boundary becomes '!' when nonzero bytes trail it.
fn hex_field(payload: &[u8; PAYLOAD_BYTES], da_len: usize) -> String {
    let trailing_nonzero = payload[da_len..].iter().any(|&b| b != 0);
    let mut out = String::with_capacity(HEX_FIELD_WIDTH);
    for (i, b) in payload.iter().enumerate() {
        if i > 0 {
            out.push(if i == da_len && trailing_nonzero { '!' } else { '.' });
        }
        out.push_str(&format!("{b:02x}"));
    }
    while out.len() < HEX_FIELD_WIDTH {
        out.push(' ');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
