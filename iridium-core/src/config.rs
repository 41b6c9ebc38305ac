//! Station configuration.
//!
//! A small YAML subset (two-level maps, scalar values) read from
//! `~/.iridium-decode/config.yaml`. Settings are addressed internally
//! as dotted paths (`output.acars`, `publish`); unknown paths are
//! ignored so a config written by a newer build still loads.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::types::IridiumError;

/// Everything the decoder reads from the config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub station: StationConfig,
    pub output: OutputConfig,
    pub publish: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Echo RAW lines for every input frame.
    pub raw: bool,
    /// Print parsed IDA burst lines.
    pub parsed: bool,
    /// Print lenient ACARS text records.
    pub acars: bool,
    /// Print strict ACARS JSON records.
    pub acars_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            station: StationConfig {
                id: "default".into(),
            },
            output: OutputConfig {
                raw: false,
                parsed: true,
                acars: true,
                acars_json: false,
            },
            publish: None,
        }
    }
}

impl Config {
    /// Apply one dotted-path setting. Unknown paths and unparseable
    /// scalars leave the config untouched.
    fn set(&mut self, path: &str, raw: &str) {
        match path {
            "station.id" => {
                if let Some(v) = scalar_string(raw) {
                    self.station.id = v;
                }
            }
            "publish" => self.publish = scalar_string(raw),
            "output.raw" => set_flag(&mut self.output.raw, raw),
            "output.parsed" => set_flag(&mut self.output.parsed, raw),
            "output.acars" => set_flag(&mut self.output.acars, raw),
            "output.acars_json" => set_flag(&mut self.output.acars_json, raw),
            _ => {}
        }
    }
}

fn set_flag(slot: &mut bool, raw: &str) {
    if let Some(v) = scalar_bool(raw) {
        *slot = v;
    }
}

/// Directory holding per-station state (`~/.iridium-decode/`).
pub fn config_dir() -> PathBuf {
    home_dir().join(".iridium-decode")
}

/// Path of the config file inside [`config_dir`].
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn home_dir() -> PathBuf {
    ["HOME", "USERPROFILE"]
        .iter()
        .find_map(std::env::var_os)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Read the station config, falling back to defaults when the file is
/// missing or unreadable.
pub fn load_config() -> Config {
    std::fs::read_to_string(config_file())
        .map(|text| parse_config(&text))
        .unwrap_or_default()
}

/// Write the config back out, creating the directory on first use.
pub fn save_config(config: &Config) -> Result<PathBuf, IridiumError> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir).map_err(|e| IridiumError::Config(e.to_string()))?;

    let path = config_file();
    std::fs::write(&path, serialize_config(config))
        .map_err(|e| IridiumError::Config(e.to_string()))?;

    Ok(path)
}

/// Parse the YAML subset, starting from defaults.
fn parse_config(text: &str) -> Config {
    let mut config = Config::default();
    for (path, raw) in flatten(text) {
        config.set(&path, &raw);
    }
    config
}

/// Reduce config text to (dotted path, raw scalar) pairs.
///
/// A top-level `key:` with no value opens a section; indented `key:
/// value` lines below it flatten to `section.key`.
fn flatten(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut section = String::new();

    for raw in text.lines() {
        let line = raw.trim_end();
        let body = line.trim_start();
        if body.is_empty() || body.starts_with('#') {
            continue;
        }
        let Some((key, value)) = body.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        let indented = line.len() > body.len();
        if !indented {
            section.clear();
            if value.is_empty() {
                section.push_str(key);
                continue;
            }
        }

        let path = if indented && !section.is_empty() {
            format!("{section}.{key}")
        } else {
            key.to_string()
        };
        pairs.push((path, value.to_string()));
    }

    pairs
}

fn scalar_string(raw: &str) -> Option<String> {
    match raw {
        "" | "~" | "null" => None,
        quoted => Some(
            quoted
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string(),
        ),
    }
}

fn scalar_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Render the config back into its file form.
fn serialize_config(config: &Config) -> String {
    let mut out = String::from("# iridium-decode configuration\n\n");
    let _ = write!(
        out,
        "station:\n  id: \"{id}\"\n\n\
         output:\n  raw: {raw}\n  parsed: {parsed}\n  acars: {acars}\n  acars_json: {json}\n\n",
        id = config.station.id,
        raw = config.output.raw,
        parsed = config.output.parsed,
        acars = config.output.acars,
        json = config.output.acars_json,
    );
    match &config.publish {
        Some(addr) => {
            let _ = writeln!(out, "publish: \"{addr}\"");
        }
        None => out.push_str("publish: null\n"),
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.station.id, "default");
        assert!(config.output.parsed);
        assert!(!config.output.acars_json);
        assert!(config.publish.is_none());
    }

    #[test]
    fn test_flatten_paths() {
        let pairs = flatten("station:\n  id: x\npublish: y\noutput:\n  raw: true\n");
        assert_eq!(
            pairs,
            vec![
                ("station.id".to_string(), "x".to_string()),
                ("publish".to_string(), "y".to_string()),
                ("output.raw".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
station:
  id: "rooftop-1"

output:
  raw: true
  parsed: false
  acars: yes
  acars_json: true

publish: "127.0.0.1:4712"
"#;
        let config = parse_config(text);
        assert_eq!(config.station.id, "rooftop-1");
        assert!(config.output.raw);
        assert!(!config.output.parsed);
        assert!(config.output.acars);
        assert!(config.output.acars_json);
        assert_eq!(config.publish, Some("127.0.0.1:4712".into()));
    }

    #[test]
    fn test_parse_config_null_and_unknown() {
        let text = r#"
station:
  id: "test"
  color: "mauve"

antenna:
  gain: 12

publish: ~
"#;
        let config = parse_config(text);
        assert_eq!(config.station.id, "test");
        assert!(config.publish.is_none(), "~ reads as unset");
        // unknown paths fall through without disturbing anything
        assert!(config.output.parsed);
    }

    #[test]
    fn test_bad_scalar_keeps_default() {
        let config = parse_config("output:\n  parsed: maybe\n");
        assert!(config.output.parsed, "unparseable bool leaves the default");
    }

    #[test]
    fn test_single_quoted_string() {
        let config = parse_config("station:\n  id: 'apostrophe'\n");
        assert_eq!(config.station.id, "apostrophe");
    }

    #[test]
    fn test_roundtrip() {
        let config = Config {
            station: StationConfig {
                id: "station-7".into(),
            },
            output: OutputConfig {
                raw: true,
                parsed: true,
                acars: false,
                acars_json: true,
            },
            publish: Some("0.0.0.0:4712".into()),
        };
        let parsed = parse_config(&serialize_config(&config));
        assert_eq!(parsed.station.id, "station-7");
        assert!(parsed.output.raw);
        assert!(!parsed.output.acars);
        assert!(parsed.output.acars_json);
        assert_eq!(parsed.publish, Some("0.0.0.0:4712".into()));
    }

    #[test]
    fn test_roundtrip_no_publish() {
        let parsed = parse_config(&serialize_config(&Config::default()));
        assert!(parsed.publish.is_none());
    }
}
