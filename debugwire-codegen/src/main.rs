//! debugwire-codegen: generates typed bindings from protocol descriptions
//!
//! Reads one or more protocol description files, merges their domains, and
//! writes a Rust module per domain plus the method registry.

mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use debugwire_utils::{init_logging_with_config, LogConfig};

fn main() {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig {
            filter: "debug".into(),
            ..LogConfig::codegen()
        }
    } else {
        LogConfig::codegen()
    };
    if let Err(e) = init_logging_with_config(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let mut stdout = std::io::stdout();
    let exit_code = match commands::execute(cli.command, cli.config.as_deref(), &mut stdout) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    };

    std::process::exit(exit_code);
}
