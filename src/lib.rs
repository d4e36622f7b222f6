//! g4track - keep a scanned-document manifest in sync with JPG to G4 TIFF conversion
//!
//! A manifest groups page files into documents. Pages still stored as JPG
//! are pending; pages stored as TIF are converted. This library parses the
//! manifest, derives the ordered list of pending pages, tracks which of them
//! the user has ticked, runs conversions in parallel and rewrites the
//! manifest so it always describes the files on disk.
//!
//! ```no_run
//! use g4track::convert::{CommandCodec, Coordinator};
//! use g4track::session::Session;
//!
//! let mut session = Session::load("scans/list.csv")?;
//! session.tick_all();
//!
//! let codec = CommandCodec::default();
//! let coordinator = Coordinator::new(&codec, session.base_dir().to_path_buf());
//! let report = session.convert_ticked(&coordinator);
//! for (id, outcome) in report.outcomes() {
//!     println!("{id}: {outcome:?}");
//! }
//! # Ok::<(), g4track::manifest::ManifestError>(())
//! ```

use thiserror::Error;

pub mod cli;
pub mod commands;
pub mod config;
pub mod convert;
pub mod manifest;
pub mod output;
pub mod registry;
pub mod selection;
pub mod session;
pub mod verify;

#[cfg(test)]
pub mod testing;

/// Error enum, contains all failure states of the program
#[derive(Debug, Error)]
pub enum G4TrackError {
    /// Manifest could not be loaded or saved
    #[error("Manifest error: {0}")]
    ManifestError(#[from] manifest::ManifestError),
    /// Represents a configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ::config::ConfigError),
    /// Represents an I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// JSON output could not be produced
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A batch finished with pages that did not convert or were not recorded
    #[error("{0}")]
    Incomplete(String),
}
