//! External JPG to G4 TIFF converter
//!
//! The pixel work (grayscale, 1-bit threshold, CCITT Group 4 compression) is
//! delegated to an external program configured as a shell command template.
//! `{input}` and `{output}` in the template are replaced with the quoted JPG
//! and TIFF paths.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::CodecError;
use crate::output::{OutputWriter, short_name};

/// Default converter: ImageMagick, thresholded to 1-bit, Group 4 compressed
pub const DEFAULT_COMMAND: &str =
    "magick {input} -colorspace Gray -threshold 50% -compress Group4 {output}";

/// One page handed to a codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecJob {
    /// Display name, e.g. `page1.jpg`
    pub name: String,
    /// Resolved JPG path
    pub source: PathBuf,
    /// TIFF path to produce (same base name, `tif` extension)
    pub output: PathBuf,
}

/// Converts one JPG page into a monochrome G4 TIFF.
///
/// Implementations are called from several worker threads at once, each call
/// on a different page.
pub trait Codec: Send + Sync {
    /// Produce `job.output` from `job.source`
    ///
    /// # Errors
    ///
    /// Returns a `CodecError` describing why the page could not be converted.
    fn convert(&self, job: &CodecJob) -> Result<(), CodecError>;
}

impl<F> Codec for F
where
    F: Fn(&CodecJob) -> Result<(), CodecError> + Send + Sync,
{
    fn convert(&self, job: &CodecJob) -> Result<(), CodecError> {
        self(job)
    }
}

/// Codec that runs an external command through `sh -c`
#[derive(Debug, Clone)]
pub struct CommandCodec {
    template: String,
}

impl CommandCodec {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Command line for one job with paths substituted
    #[must_use]
    pub fn command_line(&self, job: &CodecJob) -> String {
        self.template
            .replace("{input}", &shell_quote(&job.source))
            .replace("{output}", &shell_quote(&job.output))
    }
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND)
    }
}

impl Codec for CommandCodec {
    fn convert(&self, job: &CodecJob) -> Result<(), CodecError> {
        if !job.source.exists() {
            return Err(CodecError::MissingInput(job.source.clone()));
        }

        let cmd = self.command_line(job);
        debug!(%cmd, "running converter");
        let out = Command::new("sh")
            .arg("-c")
            .arg(&cmd)
            .output()
            .map_err(CodecError::Spawn)?;

        if !out.status.success() {
            return Err(CodecError::CommandFailed {
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        if !job.output.exists() {
            return Err(CodecError::OutputMissing(job.output.clone()));
        }
        Ok(())
    }
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

/// What happens to the source JPG once its conversion is recorded
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OriginalPolicy {
    /// Leave the JPG on disk
    #[default]
    Keep,
    /// Delete the JPG after the manifest has been saved
    Delete,
}

impl fmt::Display for OriginalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keep => "keep",
            Self::Delete => "delete",
        })
    }
}

impl FromStr for OriginalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "delete" => Ok(Self::Delete),
            other => Err(format!("Invalid original policy '{other}'. Use 'keep' or 'delete'")),
        }
    }
}

/// Apply `policy` to the sources of recorded conversions.
///
/// Only call this once the manifest naming the TIFFs has been saved. Returns
/// the number of JPGs removed; removal failures are reported as warnings.
pub fn apply_original_policy(
    policy: OriginalPolicy,
    sources: &[PathBuf],
    output: Option<&dyn OutputWriter>,
) -> usize {
    if policy == OriginalPolicy::Keep {
        return 0;
    }
    let mut removed = 0;
    for source in sources {
        match std::fs::remove_file(source) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %source.display(), error = %e, "could not remove original");
                if let Some(out) = output {
                    out.warning(&format!("Could not remove {}: {e}", short_name(source)));
                }
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dir: &Path, name: &str) -> CodecJob {
        CodecJob {
            name: format!("{name}.jpg"),
            source: dir.join(format!("{name}.jpg")),
            output: dir.join(format!("{name}.tif")),
        }
    }

    #[test]
    fn test_command_line_substitution() {
        let codec = CommandCodec::new("conv {input} -o {output}");
        let j = CodecJob {
            name: "p.jpg".into(),
            source: PathBuf::from("/scans/it's.jpg"),
            output: PathBuf::from("/scans/it's.tif"),
        };
        assert_eq!(
            codec.command_line(&j),
            r"conv '/scans/it'\''s.jpg' -o '/scans/it'\''s.tif'"
        );
    }

    #[test]
    fn test_default_template_mentions_group4() {
        assert!(CommandCodec::default().template().contains("Group4"));
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = CommandCodec::new("true").convert(&job(dir.path(), "gone")).unwrap_err();
        assert!(matches!(err, CodecError::MissingInput(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_success() {
        let dir = tempfile::TempDir::new().unwrap();
        let j = job(dir.path(), "p1");
        std::fs::write(&j.source, b"jpeg").unwrap();
        CommandCodec::new("cp {input} {output}").convert(&j).unwrap();
        assert!(j.output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure_status() {
        let dir = tempfile::TempDir::new().unwrap();
        let j = job(dir.path(), "p1");
        std::fs::write(&j.source, b"jpeg").unwrap();
        let err = CommandCodec::new("echo broken >&2; exit 3").convert(&j).unwrap_err();
        match err {
            CodecError::CommandFailed { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_command_without_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let j = job(dir.path(), "p1");
        std::fs::write(&j.source, b"jpeg").unwrap();
        let err = CommandCodec::new("true").convert(&j).unwrap_err();
        assert!(matches!(err, CodecError::OutputMissing(_)));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("keep".parse::<OriginalPolicy>(), Ok(OriginalPolicy::Keep));
        assert_eq!(" DELETE ".parse::<OriginalPolicy>(), Ok(OriginalPolicy::Delete));
        assert!("shred".parse::<OriginalPolicy>().is_err());
    }

    #[test]
    fn test_apply_policy() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        std::fs::write(&a, b"x").unwrap();
        let missing = dir.path().join("missing.jpg");

        assert_eq!(apply_original_policy(OriginalPolicy::Keep, &[a.clone()], None), 0);
        assert!(a.exists());

        let out = crate::output::BufferedWriter::new();
        let removed = apply_original_policy(OriginalPolicy::Delete, &[a.clone(), missing], Some(&out));
        assert_eq!(removed, 1);
        assert!(!a.exists());
        assert_eq!(out.messages_at(crate::output::MessageLevel::Warning).len(), 1);
    }
}
