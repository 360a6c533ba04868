mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;
use preat_frame::Crc16;

use crate::cmd::{parse_u16, Command};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "preat", version, about = "Remote execution of automated tests")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// CRC-16 generator polynomial shared with the target.
    #[arg(long, value_name = "POLY", env = "PREAT_CRC_POLY", value_parser = parse_u16, default_value = "0xD175", global = true)]
    crc_poly: u16,

    /// CRC-16 initial value shared with the target.
    #[arg(long, value_name = "INIT", env = "PREAT_CRC_INIT", value_parser = parse_u16, default_value = "0x0000", global = true)]
    crc_init: u16,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let crc = Crc16::new(cli.crc_poly, cli.crc_init);
    let result = cmd::run(cli.command, crc, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
