//! iridium: CLI for decoding demodulated Iridium burst captures.
//!
//! Reads `RAW:` burst lines from a file or stdin, runs them through the
//! iridium-core pipeline, and routes records to stdout and (optionally)
//! a TCP publish sink. Status goes to stderr, data to stdout.

use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use iridium_core::config;
use iridium_core::output::Formatter;
use iridium_core::pipeline::{Event, Pipeline, PipelineStats};

mod input;
mod publish;

use publish::Publisher;

#[derive(Parser)]
#[command(name = "iridium", version, about = "Iridium L-band burst decoder and parser")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a burst capture into IDA/SBD/ACARS records
    Parse {
        /// Capture file of RAW burst lines ("-" for stdin)
        file: PathBuf,

        /// Echo a RAW line for every input frame
        #[arg(long)]
        raw: bool,

        /// Print parsed IDA burst lines
        #[arg(long)]
        parsed: bool,

        /// Print ACARS text records (kept even with errors)
        #[arg(long)]
        acars: bool,

        /// Print ACARS JSON records (errored records dropped)
        #[arg(long)]
        acars_json: bool,

        /// Station identifier for ACARS JSON output
        #[arg(long, env = "IRIDIUM_STATION_ID")]
        station_id: Option<String>,

        /// Also publish emitted lines on this TCP endpoint
        #[arg(long)]
        publish: Option<String>,
    },

    /// Decode a capture and print only the run summary
    Stats {
        /// Capture file of RAW burst lines ("-" for stdin)
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            file,
            raw,
            parsed,
            acars,
            acars_json,
            station_id,
            publish,
        } => cmd_parse(file, raw, parsed, acars, acars_json, station_id, publish),
        Commands::Stats { file } => cmd_stats(file),
    }
}

fn open_input(file: &PathBuf) -> io::Result<Box<dyn BufRead>> {
    if file.as_os_str() == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(std::fs::File::open(file)?)))
    }
}

fn source_label(file: &PathBuf) -> String {
    if file.as_os_str() == "-" {
        "stdin".to_string()
    } else {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string())
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_parse(
    file: PathBuf,
    raw: bool,
    parsed: bool,
    acars: bool,
    acars_json: bool,
    station_id: Option<String>,
    publish: Option<String>,
) {
    let cfg = config::load_config();

    // explicit output flags override the config block wholesale
    let (raw, parsed, acars, acars_json) = if raw || parsed || acars || acars_json {
        (raw, parsed, acars, acars_json)
    } else {
        (
            cfg.output.raw,
            cfg.output.parsed,
            cfg.output.acars,
            cfg.output.acars_json,
        )
    };
    let station = station_id.unwrap_or(cfg.station.id);
    let publish = publish.or(cfg.publish);

    let running = Arc::new(AtomicBool::new(true));
    let publisher = match publish {
        Some(addr) => match Publisher::start(addr, running.clone()) {
            Ok(p) => {
                eprintln!("publishing records on {}", p.local_addr());
                Some(p)
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let reader = match open_input(&file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: cannot open {}: {e}", file.display());
            std::process::exit(1);
        }
    };

    let mut fmtr = Formatter::new(source_label(&file), Some(station));
    let mut pipeline = Pipeline::new();
    let mut skipped = 0u64;

    let emit = |line: &str, publisher: &Option<Publisher>| {
        println!("{line}");
        if let Some(p) = publisher {
            p.send(line);
        }
    };

    for line in reader.lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error: read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(frame) = input::parse_raw_line(&line) else {
            skipped += 1;
            continue;
        };

        if raw {
            emit(&fmtr.raw_line(&frame), &publisher);
        }
        for event in pipeline.push(&frame) {
            match event {
                Event::Burst(burst) => {
                    if parsed {
                        emit(&fmtr.ida_line(&burst), &publisher);
                    }
                }
                Event::Message(_) | Event::Sbd(_) => {}
                Event::MtPosition(pos) => {
                    if parsed {
                        emit(&fmtr.mtp_line(&pos), &publisher);
                    }
                }
                Event::Acars(rec) => {
                    if acars {
                        emit(&fmtr.acars_text(&rec), &publisher);
                    }
                    if acars_json {
                        if let Some(doc) = fmtr.acars_json(&rec) {
                            match serde_json::to_string(&doc) {
                                Ok(json) => emit(&json, &publisher),
                                Err(e) => eprintln!("Error: JSON encode failed: {e}"),
                            }
                        }
                    }
                }
            }
        }
    }

    print_summary(&pipeline.stats, skipped);
    if let Some(p) = publisher {
        p.shutdown();
    }
}

fn cmd_stats(file: PathBuf) {
    let reader = match open_input(&file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: cannot open {}: {e}", file.display());
            std::process::exit(1);
        }
    };

    let mut pipeline = Pipeline::new();
    let mut skipped = 0u64;
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        match input::parse_raw_line(&line) {
            Some(frame) => {
                pipeline.push(&frame);
            }
            None => skipped += 1,
        }
    }

    print_summary(&pipeline.stats, skipped);
}

fn print_summary(stats: &PipelineStats, skipped: u64) {
    eprintln!(
        "{} frames ({} unparseable lines skipped)",
        stats.frames, skipped
    );
    eprintln!(
        "  {} IDA bursts ({} rejected, {} CRC failures)",
        stats.bursts, stats.rejected, stats.crc_failures
    );
    eprintln!(
        "  {} messages, {} SBD packets, {} ACARS records, {} MT positions",
        stats.messages, stats.sbd_packets, stats.acars_records, stats.mt_positions
    );
}
