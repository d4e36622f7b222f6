//! Manifest-specific error types
//!
//! A manifest either parses completely or not at all, so every row-level
//! problem surfaces as [`ManifestError::MalformedRow`] carrying the 1-based
//! line number of the offending row.

use thiserror::Error;

/// What was wrong with a manifest row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowProblem {
    /// The first field (document target name) is empty
    #[error("missing target name")]
    MissingTarget,

    /// The row has a target name but no page fields
    #[error("no page fields")]
    NoPages,

    /// A page field does not end in `.jpg` or `.tif`
    #[error("unrecognized extension in '{0}'")]
    UnrecognizedExtension(String),

    /// A page field is only a directory and an extension, e.g. `scans/.jpg`
    #[error("no file name in '{0}'")]
    MissingFileName(String),
}

/// Manifest load/save errors
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A row could not be parsed; no manifest is produced
    #[error("Malformed row at line {line}: {problem}")]
    MalformedRow {
        line: u64,
        problem: RowProblem,
    },

    /// Underlying CSV reader error
    #[error("Error while reading manifest: {0}")]
    Csv(#[from] csv::Error),

    /// Reading or writing the manifest file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ManifestError {
    /// Line number of the failing row, if this is a row error
    #[must_use]
    pub const fn line(&self) -> Option<u64> {
        match self {
            Self::MalformedRow { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
