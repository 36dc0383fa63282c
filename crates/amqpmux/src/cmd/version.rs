use amqpmux_frame::{DEFAULT_FRAME_MAX, MAX_CHANNEL_ID};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("amqpmux {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: amqpmux");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("protocol: AMQP 0-9-1");
    println!(
        "build_target: {}",
        option_env!("AMQPMUX_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("default_frame_max: {DEFAULT_FRAME_MAX}");
    println!("max_channel_id: {MAX_CHANNEL_ID}");
    println!("stream_engine: {}", cfg!(unix));

    Ok(SUCCESS)
}
