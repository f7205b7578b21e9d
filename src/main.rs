use std::fs::File;

use anyhow::Context;
use clap::Parser;
use env_logger::{Env, Target};

use chip8_vm::config::Settings;
use chip8_vm::emulator::Emulator;

fn init_logging(settings: &Settings) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("error"));
    if let Some(path) = &settings.log_file {
        let file = File::create(path)
            .with_context(|| format!("Unable to create log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    init_logging(&settings)?;

    let mut emulator = Emulator::new(settings);
    emulator.run()?;

    Ok(())
}
