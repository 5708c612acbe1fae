//! Logger setup for the `scrape` binary.
//!
//! Logs always go to stderr so stdout stays clean for results; `--log-file`
//! mirrors them into `./scrape.log`.

use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

pub const LOG_FILE: &str = "./scrape.log";

/// Installs the global logger. A log file that cannot be created is reported
/// and skipped.
pub fn initialize(level: LevelFilter, log_file: Option<&Path>) {
    let config = logger_config();
    let mut sinks: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        match File::create(path) {
            Ok(file) => sinks.push(WriteLogger::new(level, config, file)),
            Err(err) => eprintln!("Warning: could not create log file {}: {}", path.display(), err),
        }
    }

    let _ = CombinedLogger::init(sinks);
}

fn logger_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        // connection-level chatter from the http stack
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build()
}
