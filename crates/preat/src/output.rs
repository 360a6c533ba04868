use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use preat_frame::{method_name, wire_code, Message, Outcome};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Frame bytes only.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Something a command prints.
pub trait Report: Serialize {
    /// `(field, value)` pairs for the table and pretty formats.
    fn fields(&self) -> Vec<(&'static str, String)>;
    /// Bytes written by the raw format.
    fn raw(&self) -> &[u8];
}

/// Result of one request/response exchange.
#[derive(Debug, Serialize)]
pub struct OutcomeReport {
    pub method: String,
    pub method_name: &'static str,
    pub code: u8,
    pub result: &'static str,
    pub elapsed_ms: u128,
    pub response: String,
    #[serde(skip)]
    pub response_bytes: Vec<u8>,
}

impl OutcomeReport {
    pub fn new(method: u16, outcome: &Outcome, response: &[u8], elapsed_ms: u128) -> Self {
        Self {
            method: format!("0x{method:03x}"),
            method_name: method_name(method),
            code: wire_code(outcome),
            result: outcome_name(outcome),
            elapsed_ms,
            response: hex(response),
            response_bytes: response.to_vec(),
        }
    }
}

impl Report for OutcomeReport {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("method", format!("{} ({})", self.method, self.method_name)),
            ("result", format!("{} (0x{:02x})", self.result, self.code)),
            ("elapsed_ms", self.elapsed_ms.to_string()),
            ("response", self.response.clone()),
        ]
    }

    fn raw(&self) -> &[u8] {
        &self.response_bytes
    }
}

/// A request frame and its decoded contents.
#[derive(Debug, Serialize)]
pub struct FrameReport {
    pub length: usize,
    pub method: String,
    pub method_name: &'static str,
    pub params: Vec<String>,
    pub frame: String,
    #[serde(skip)]
    pub frame_bytes: Vec<u8>,
}

impl FrameReport {
    pub fn new(message: &Message, frame: &[u8]) -> Self {
        Self {
            length: frame.len(),
            method: format!("0x{:03x}", message.method),
            method_name: method_name(message.method),
            params: message.params.iter().map(ToString::to_string).collect(),
            frame: hex(frame),
            frame_bytes: frame.to_vec(),
        }
    }
}

impl Report for FrameReport {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("length", self.length.to_string()),
            ("method", format!("{} ({})", self.method, self.method_name)),
            ("params", self.params.join(" ")),
            ("frame", self.frame.clone()),
        ]
    }

    fn raw(&self) -> &[u8] {
        &self.frame_bytes
    }
}

pub fn print_report<R: Report>(report: &R, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in report.fields() {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = report
                .fields()
                .into_iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect();
            println!("{}", line.join(" "));
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(report.raw());
            let _ = out.flush();
        }
    }
}

pub fn outcome_name(outcome: &Outcome) -> &'static str {
    match outcome {
        Ok(()) => "no_error",
        Err(code) => code.name(),
    }
}

/// Lowercase hex, space separated.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse hex bytes, ignoring whitespace, `:` separators and `0x` prefixes.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();
    if !digits.is_ascii() {
        return Err(format!("non-hex characters in '{input}'"));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{input}'"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|at| {
            u8::from_str_radix(&digits[at..at + 2], 16)
                .map_err(|_| format!("invalid hex byte '{}'", &digits[at..at + 2]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use preat_frame::{ErrorCode, Param};

    use super::*;

    #[test]
    fn hex_round_trip_formats() {
        assert_eq!(hex(&[0x05, 0x00, 0xa1]), "05 00 a1");
        assert_eq!(parse_hex("05 00 a1").unwrap(), vec![0x05, 0x00, 0xa1]);
        assert_eq!(parse_hex("0500A1").unwrap(), vec![0x05, 0x00, 0xa1]);
        assert_eq!(parse_hex("0x05,0x00").unwrap(), vec![0x05, 0x00]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert!(parse_hex("050").is_err());
        assert!(parse_hex("zz").is_err());
        assert!(parse_hex("é1").is_err());
        assert!(parse_hex("aé1").is_err());
    }

    #[test]
    fn outcome_report_serializes_code_and_name() {
        let report = OutcomeReport::new(0x010, &Err(ErrorCode::Timeout), &[0x07], 12);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"method\":\"0x010\""));
        assert!(json.contains("\"code\":5"));
        assert!(json.contains("\"result\":\"timeout_error\""));
        assert!(!json.contains("response_bytes"));
    }

    #[test]
    fn frame_report_lists_params() {
        let message = Message {
            method: 0x005,
            params: vec![Param::U32(100), Param::U8(1)],
        };
        let report = FrameReport::new(&message, &[0x0a]);
        assert_eq!(report.method_name, "START_ASSERTION");
        assert_eq!(report.params, vec!["u32:100", "u8:1"]);
    }
}
