use preat_frame::{encode_request, Crc16, Message};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_report, FrameReport, OutputFormat};

pub fn run(args: EncodeArgs, crc: Crc16, format: OutputFormat) -> CliResult<i32> {
    let frame = encode_request(args.method, &args.params, &crc)
        .map_err(|err| frame_error("encode failed", err))?;
    let message = Message {
        method: args.method,
        params: args.params,
    };
    print_report(&FrameReport::new(&message, frame.as_frame()), format);
    Ok(SUCCESS)
}
