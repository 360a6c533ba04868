use preat_frame::{decode_frame, Crc16, FrameConfig, Message};

use crate::cmd::DecodeArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{parse_hex, print_report, FrameReport, OutputFormat};

pub fn run(args: DecodeArgs, crc: Crc16, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.frame.join(" ")).map_err(|err| CliError::new(USAGE, err))?;
    let config = FrameConfig {
        max_params: args.max_params,
        crc,
    };

    let mut message = Message::default();
    decode_frame(&bytes, &config, &mut message).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!(
                "decode failed: {err} (a target answers {})",
                err.error_code().name()
            ),
        )
    })?;

    // Bytes past the length byte are not part of the frame.
    let len = usize::from(bytes[0]);
    print_report(&FrameReport::new(&message, &bytes[..len]), format);
    Ok(SUCCESS)
}
