use std::io::{Read, Write};
use std::time::Instant;

use preat_frame::{decode_response, encode_request, Crc16, FrameBuffer, FrameReader, FrameWriter};
use preat_transport::LinkStream;
use tracing::debug;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{frame_error, transport_error, CliResult, ASSERTION_FAILED, SUCCESS};
use crate::output::{hex, print_report, OutcomeReport, OutputFormat};

pub fn run(args: SendArgs, crc: Crc16, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let request = encode_request(args.method, &args.params, &crc)
        .map_err(|err| frame_error("encode failed", err))?;

    let link =
        LinkStream::connect(&args.addr).map_err(|err| transport_error("connect failed", err))?;
    link.set_read_timeout(Some(timeout))
        .map_err(|err| transport_error("connect failed", err))?;

    debug!(request = %hex(request.as_frame()), "sending request");
    let started = Instant::now();
    let response = exchange(link, &request).map_err(|err| frame_error("exchange failed", err))?;
    let elapsed = started.elapsed();

    let outcome = decode_response(response.as_frame(), &crc)
        .map_err(|err| frame_error("invalid response", err))?;
    print_report(
        &OutcomeReport::new(args.method, &outcome, response.as_frame(), elapsed.as_millis()),
        format,
    );

    Ok(if outcome.is_ok() {
        SUCCESS
    } else {
        ASSERTION_FAILED
    })
}

/// Write one request and read one response frame.
fn exchange<S: Read + Write>(stream: S, request: &FrameBuffer) -> preat_frame::Result<FrameBuffer> {
    let mut reader = FrameReader::new(stream);
    FrameWriter::new(reader.get_mut()).write_frame(request)?;
    let mut response = FrameBuffer::new();
    reader.read_frame(&mut response)?;
    Ok(response)
}
