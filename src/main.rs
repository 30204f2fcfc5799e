#[macro_use]
extern crate log;

use std::fs::OpenOptions;

use anyhow::Error;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, TermLogger, TerminalMode, WriteLogger,
};

use crate::program::Program;

mod mirror;
mod program;

/// Name of the file the full-detail run log is appended to.
const LOG_NAME: &str = "gallery_mirror.log";

fn main() -> Result<(), Error> {
    initialize_logger();

    let program = Program::new();
    program.run()
}

/// Initializes the logger with preset filtering: Info and above on the
/// terminal, everything into the run log file.
fn initialize_logger() {
    let mut config = ConfigBuilder::new();
    config.add_filter_allow_str("gallery_mirror");

    let log_file = match OpenOptions::new().create(true).append(true).open(LOG_NAME) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Failed to open log file {}: {}. Logging will only output to terminal.",
                LOG_NAME, e
            );
            let _ = TermLogger::init(
                LevelFilter::Info,
                Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            );
            return;
        }
    };

    if let Err(e) = CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::max(), config.build(), log_file),
    ]) {
        eprintln!(
            "Failed to initialize combined logger: {}. Falling back to terminal-only logging.",
            e
        );
        let _ = TermLogger::init(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        );
    }
}
