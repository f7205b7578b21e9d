use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_CLOCK_HZ: u64 = 540;
pub const DEFAULT_FRAME_RATE: u64 = 60;
pub const DEFAULT_SLEEP_MS: u64 = 2;

#[derive(Parser, Debug)]
#[command(version, about = "A CHIP-8 virtual machine for the terminal")]
pub struct Settings {
    /// Path to the CHIP-8 program image
    pub rom: PathBuf,

    /// Instructions executed per second
    #[arg(
        long,
        default_value_t = DEFAULT_CLOCK_HZ,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub clock_hz: u64,

    /// Screen redraws per second
    #[arg(
        long,
        default_value_t = DEFAULT_FRAME_RATE,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub frame_rate: u64,

    /// Milliseconds to sleep between instruction batches
    #[arg(long, default_value_t = DEFAULT_SLEEP_MS)]
    pub sleep_ms: u64,

    /// Seed for the RND instruction; random if omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write log output to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
