use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use preat_assert::AssertionConfig;
use preat_dispatch::{BoardConfig, Dispatcher, DispatcherConfig, Server, ServerConfig, SimBoard};
use preat_frame::{Crc16, FrameConfig};
use preat_transport::{LinkAddr, LinkListener, LinkStream};
use tracing::info;

use crate::cmd::{parse_duration, parse_latency, ServeArgs};
use crate::exit::{serve_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs, crc: Crc16) -> CliResult<i32> {
    let loopback_latency = parse_latency(&args.latency)?;
    let poll = parse_duration(&args.poll)?;

    let config = DispatcherConfig {
        frame: FrameConfig {
            crc,
            ..FrameConfig::default()
        },
        assertion: AssertionConfig {
            max_inputs: args.max_inputs,
        },
        clear_assertion_on_error: !args.keep_assertion,
        ..DispatcherConfig::default()
    };
    let mut dispatcher = Dispatcher::with_config(config);
    let board = SimBoard::new(
        BoardConfig {
            outputs: args.outputs,
            inputs: args.inputs,
            loopback_latency,
        },
        dispatcher.signal(),
    );
    if !board.install(dispatcher.registry_mut()) {
        return Err(CliError::new(INTERNAL, "method registry full"));
    }

    let listener =
        LinkListener::bind(&args.addr).map_err(|err| transport_error("bind failed", err))?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), listener.local_addr().clone())?;

    info!(
        addr = %listener.local_addr(),
        outputs = args.outputs,
        inputs = args.inputs,
        "simulated target ready"
    );

    let mut server = Server::with_config(
        dispatcher,
        ServerConfig {
            read_timeout: Some(poll),
        },
    );
    server
        .run(&listener, &running)
        .map_err(|err| serve_error("serve failed", err))?;

    info!("target stopped");
    Ok(SUCCESS)
}

/// Clear `running` on Ctrl-C and poke the listener so a blocked accept returns.
fn install_ctrlc_handler(running: Arc<AtomicBool>, addr: LinkAddr) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        let _ = LinkStream::connect(&addr);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
