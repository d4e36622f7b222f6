//! Command-line interface definitions and parsing
//!
//! This module defines the CLI structure for g4track using the `clap` crate.
//!
//! # Commands
//!
//! - **list**: Show pages still waiting for conversion
//! - **convert**: Convert selected pages and update the manifest
//! - **verify**: Check the manifest against the files on disk
//! - **config**: Read or change configuration values
//!
//! # Examples
//!
//! ```bash
//! g4track list scans/list.csv
//! g4track convert scans/list.csv page1.jpg 0:3
//! g4track convert scans/list.csv --pattern 'cover*' --dry-run
//! g4track convert scans/list.csv --all --yes
//! g4track verify scans/list.csv --repair
//! g4track config set original_policy=delete
//! ```

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure for parsing command-line arguments
#[derive(Parser, Debug)]
#[command(name = "g4track")]
#[command(about = "Track scanned pages awaiting JPG to G4 TIFF conversion", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Suppress informational output (only print results and errors)
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List pages still waiting for conversion, in display order
    #[command(visible_alias = "ls")]
    List {
        /// Manifest file (.txt or .csv)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Print the pending pages as JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Convert pages to G4 TIFF and record them in the manifest
    #[command(visible_alias = "c")]
    Convert {
        /// Manifest file (.txt or .csv)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Pages to convert: file name (page1.jpg), base name (page1) or DOC:ROW
        #[arg(value_name = "PAGE", num_args = 0..)]
        pages: Vec<String>,

        /// Convert every pending page
        #[arg(short = 'a', long = "all", conflicts_with_all = ["pages", "patterns"])]
        all: bool,

        /// Select pages whose file name matches a glob pattern
        #[arg(short = 'p', long = "pattern", value_name = "GLOB")]
        patterns: Vec<String>,

        /// Show what would be converted without running the converter
        #[arg(short = 'n', long = "dry-run")]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long = "yes")]
        yes: bool,

        /// Number of converter workers (overrides config)
        #[arg(short = 'j', long = "workers", value_name = "N")]
        workers: Option<usize>,

        /// Delete each JPG once its conversion is saved (overrides config)
        #[arg(long = "delete-originals")]
        delete_originals: bool,
    },

    /// Report pages whose files are missing on disk
    Verify {
        /// Manifest file (.txt or .csv)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Re-create missing TIFFs from JPGs that are still present
        #[arg(long = "repair")]
        repair: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Configuration management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Set a configuration value
    Set {
        /// Configuration key=value (e.g., original_policy=delete)
        #[arg(value_name = "KEY=VALUE")]
        setting: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key to retrieve (e.g., workers)
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Print the config file location
    Path,
}

impl Cli {
    /// Parse command-line arguments
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let cli = Cli::try_parse_from(["g4track", "list", "list.csv", "--json"]).unwrap();
        match cli.command {
            Commands::List { manifest, json } => {
                assert_eq!(manifest, PathBuf::from("list.csv"));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_convert_pages() {
        let cli = Cli::try_parse_from([
            "g4track", "-q", "convert", "list.csv", "page1.jpg", "0:2", "-p", "cover*", "-y",
        ])
        .unwrap();
        assert!(cli.quiet);
        match cli.command {
            Commands::Convert { pages, patterns, yes, all, .. } => {
                assert_eq!(pages, vec!["page1.jpg", "0:2"]);
                assert_eq!(patterns, vec!["cover*"]);
                assert!(yes);
                assert!(!all);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_all_conflicts_with_pages() {
        assert!(Cli::try_parse_from(["g4track", "convert", "list.csv", "p1", "--all"]).is_err());
    }

    #[test]
    fn test_verbose_count() {
        let cli = Cli::try_parse_from(["g4track", "-vv", "verify", "list.csv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_config_set() {
        let cli = Cli::try_parse_from(["g4track", "config", "set", "workers=4"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config { command: ConfigCommands::Set { ref setting } } if setting == "workers=4"
        ));
    }
}
