use std::time::Duration;

use clap::{Args, Subcommand};
use preat_frame::{Crc16, Param, MAX_METHOD_ID};
use preat_transport::LinkAddr;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulated target on a link until interrupted.
    Serve(ServeArgs),
    /// Send one request to a target and print its answer.
    Send(SendArgs),
    /// Print the request frame for a method call.
    Encode(EncodeArgs),
    /// Decode a request frame given as hex.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, crc: Crc16, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, crc),
        Command::Send(args) => send::run(args, crc, format),
        Command::Encode(args) => encode::run(args, crc, format),
        Command::Decode(args) => decode::run(args, crc, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Link address to bind (unix:PATH, tcp:HOST:PORT or a socket path).
    #[arg(env = "PREAT_ADDR")]
    pub addr: LinkAddr,
    /// Number of digital outputs.
    #[arg(long, default_value_t = 8)]
    pub outputs: u8,
    /// Number of digital inputs. Output N is wired to input N.
    #[arg(long, default_value_t = 8)]
    pub inputs: u8,
    /// Delay before an output change reaches its input.
    ///
    /// An assertion only sees edges that arrive after it starts waiting, so
    /// with "0" (instant loopback) a wired edge is never observed.
    #[arg(long, default_value = "10ms")]
    pub latency: String,
    /// Maximum inputs one assertion may declare.
    #[arg(long, default_value_t = 8)]
    pub max_inputs: usize,
    /// Keep an open assertion when a frame is rejected.
    #[arg(long)]
    pub keep_assertion: bool,
    /// How often an idle link checks for shutdown (e.g. 500ms).
    #[arg(long, default_value = "500ms")]
    pub poll: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Link address of the target.
    #[arg(env = "PREAT_ADDR")]
    pub addr: LinkAddr,
    /// Method id (decimal or 0x hex).
    #[arg(value_parser = parse_method)]
    pub method: u16,
    /// Parameters as KIND:VALUE (u8:1, u16:0x200, u32:5000).
    pub params: Vec<Param>,
    /// Maximum time to wait for the answer (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Method id (decimal or 0x hex).
    #[arg(value_parser = parse_method)]
    pub method: u16,
    /// Parameters as KIND:VALUE.
    pub params: Vec<Param>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes in hex; may be split across arguments.
    #[arg(required = true, num_args = 1..)]
    pub frame: Vec<String>,
    /// Maximum parameters accepted in the frame.
    #[arg(long, default_value_t = preat_frame::DEFAULT_MAX_PARAMS)]
    pub max_params: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_method(input: &str) -> Result<u16, String> {
    let id = parse_u16(input)?;
    if id > MAX_METHOD_ID {
        return Err(format!("method id {input} out of range (max 0xfff)"));
    }
    Ok(id)
}

/// Decimal or `0x` hex.
pub fn parse_u16(input: &str) -> Result<u16, String> {
    let input = input.trim();
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid 16-bit number: {input}"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Parse a loopback latency; "0", "0s" or "0ms" selects instant propagation.
pub fn parse_latency(input: &str) -> CliResult<Option<Duration>> {
    match input.trim() {
        "0" | "0s" | "0ms" => Ok(None),
        other => parse_duration(other).map(Some),
    }
}
