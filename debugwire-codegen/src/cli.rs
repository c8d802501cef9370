//! CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Protocol binding generator for debugwire
#[derive(Parser, Debug)]
#[command(name = "debugwire-codegen")]
#[command(about = "Generate typed Rust bindings from protocol descriptions")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, env = "DEBUGWIRE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate bindings and write them to disk
    Generate {
        /// Protocol description files; domains are merged in order
        #[arg(short, long = "input", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory; bindings land in a per-version subdirectory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Write directly into the output directory, without a version subdirectory
        #[arg(long)]
        flat: bool,

        /// Leave protocol descriptions out of the generated code
        #[arg(long)]
        no_docs: bool,
    },

    /// Generate without writing; exit non-zero if any item would be skipped
    Check {
        #[arg(short, long = "input", required = true)]
        inputs: Vec<PathBuf>,
    },

    /// List every command and event method
    Methods {
        #[arg(short, long = "input", required = true)]
        inputs: Vec<PathBuf>,

        /// Only events
        #[arg(long, conflicts_with = "commands")]
        events: bool,

        /// Only commands
        #[arg(long)]
        commands: bool,
    },
}
