//! Conversion error types

use std::path::PathBuf;
use thiserror::Error;

/// Why the codec could not produce a TIFF for one page
///
/// These never abort a batch; the coordinator records them per page.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The source JPG is not on disk
    #[error("Input file does not exist: {}", .0.display())]
    MissingInput(PathBuf),

    /// The converter process could not be started
    #[error("Failed to run converter: {0}")]
    Spawn(#[source] std::io::Error),

    /// The converter exited unsuccessfully
    #[error("Converter failed ({status}): {stderr}")]
    CommandFailed {
        status: String,
        stderr: String,
    },

    /// The converter reported success but left no TIFF behind
    #[error("Output file was not created: {}", .0.display())]
    OutputMissing(PathBuf),

    /// The codec panicked while converting this page
    #[error("Converter panicked: {0}")]
    Panicked(String),

    /// Any other codec-specific failure
    #[error("{0}")]
    Other(String),
}
