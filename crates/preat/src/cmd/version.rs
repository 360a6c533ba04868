use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("preat {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: preat");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("PREAT_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("frame_capacity: {}", preat_frame::FRAME_CAPACITY);
    println!(
        "default_crc: poly=0x{:04x} init=0x{:04x}",
        preat_frame::Crc16::DEFAULT.poly,
        preat_frame::Crc16::DEFAULT.init
    );

    Ok(SUCCESS)
}
