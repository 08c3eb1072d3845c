use aio_companion::{run, Options};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// AIO Companion - battery, keypad menu and shutdown supervisor for FPV boards
#[derive(Parser, Debug)]
#[command(name = "aio-companion")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input event device number, reads /dev/input/event<DEVICE>
    #[arg(value_name = "DEVICE", default_value_t = 0)]
    device: u32,

    /// Extra configuration file layered over the defaults
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print debug logs regardless of configuration
    #[arg(long)]
    debug: bool,
}

impl From<Args> for Options {
    fn from(args: Args) -> Self {
        Self {
            device_index: args.device,
            config: args.config,
            debug: args.debug,
        }
    }
}

fn main() -> Result<()> {
    let options = Options::from(Args::parse());
    run(&options)
}
