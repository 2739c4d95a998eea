//! chipdoc - command line front end for chip tracker modules.
//!
//! ```bash
//! chipdoc new song.chip --rows 32
//! chipdoc edit song.chip "set GLOBAL/0 BPM 0 140" --journal
//! chipdoc preview song.chip PATTERNS 2 --row 0 -o preview.bin
//! chipdoc compile song.chip --asm
//! ```

mod args;
mod commands;

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, WriteLogger};

use args::Cli;

fn default_log_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chipdoc")
        .join("chipdoc.log")
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Log to `log_file` (or the default log path). When the file cannot be
/// created, log to stderr instead.
fn init_logging(verbose: u8, log_file: Option<PathBuf>) {
    let level = log_level(verbose);
    let config = ConfigBuilder::new().set_target_level(LevelFilter::Error).build();
    let path = log_file.unwrap_or_else(default_log_path);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let installed = match File::create(&path) {
        Ok(file) => WriteLogger::init(level, config, file),
        Err(e) => {
            eprintln!("chipdoc: cannot write {} ({}), logging to stderr", path.display(), e);
            TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)
        }
    };
    if installed.is_ok() {
        log::info!("chipdoc {} starting (log level: {:?})", env!("CARGO_PKG_VERSION"), level);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file);

    let config = chipdoc_core::config::Config::load();
    match commands::run(cli.command, &config) {
        Ok(output) => {
            if !output.is_empty() {
                print!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Err(commands::CliError::Usage(message)) => {
            eprintln!("chipdoc: {}\n\nSee 'chipdoc --help'.", message);
            ExitCode::from(2)
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("chipdoc: {}", e);
            ExitCode::FAILURE
        }
    }
}
