//! g4track CLI application entry point
//!
//! Tracks which pages of scanned documents still need converting from color
//! JPG to monochrome G4 TIFF, runs the conversions, and keeps the document
//! manifest in sync.
//!
//! # Usage
//!
//! ```bash
//! # Show pending pages
//! g4track list scans/list.csv
//!
//! # Convert some pages, or all of them
//! g4track convert scans/list.csv page1.jpg page7.jpg
//! g4track convert scans/list.csv --all --yes
//!
//! # Find (and re-create) missing TIFFs
//! g4track verify scans/list.csv --repair
//!
//! # Verbose diagnostics
//! g4track -v convert scans/list.csv --all
//! RUST_LOG=g4track=trace g4track list scans/list.csv
//! ```
//!
//! # Configuration
//!
//! Configuration is stored in the user's config directory
//! (`~/.config/g4track/config.toml` on Linux) and created with defaults on
//! first run.

use std::process::ExitCode;

use colored::Colorize;
use tracing_subscriber::EnvFilter;

use g4track::{
    G4TrackError,
    cli::{Cli, Commands},
    commands::{self, convert::ConvertArgs},
    config::G4TrackConfig,
};

type Result<T> = std::result::Result<T, G4TrackError>;

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = G4TrackConfig::load()?;
    let quiet = cli.quiet || config.quiet;

    match cli.command {
        Commands::List { manifest, json } => commands::list(&manifest, json, quiet),
        Commands::Convert {
            manifest,
            pages,
            all,
            patterns,
            dry_run,
            yes,
            workers,
            delete_originals,
        } => {
            let args = ConvertArgs {
                pages,
                all,
                patterns,
                dry_run,
                yes,
                workers,
                delete_originals,
            };
            commands::convert(&manifest, &args, &config, quiet)
        }
        Commands::Verify { manifest, repair } => commands::verify(&manifest, repair, &config, quiet),
        Commands::Config { command } => commands::config(&command, &mut config, quiet),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
