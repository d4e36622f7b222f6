//! Testing utilities for g4track
//!
//! Fake codecs and manifest sinks for exercising the coordinator and session
//! without an external converter.
//!
//! Only available when compiled with `cfg(test)`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use crate::convert::{Codec, CodecError, CodecJob, ManifestSink};
use crate::manifest::{Manifest, ManifestError};

/// Codec that succeeds unless the page's file name is in `failing`.
///
/// Every call is recorded. With `write_output` set it also creates the TIFF
/// file, for tests that look at the disk.
#[derive(Debug, Default)]
pub struct FakeCodec {
    failing: HashSet<String>,
    write_output: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeCodec {
    /// Codec that converts everything
    pub fn ok() -> Self {
        Self::default()
    }

    /// Codec that fails for the given file names (e.g. `"page2.jpg"`)
    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|s| (*s).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Also write an empty TIFF at the job's output path on success
    pub fn writing_output(mut self) -> Self {
        self.write_output = true;
        self
    }

    /// File names the codec was called with, sorted
    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

impl Codec for FakeCodec {
    fn convert(&self, job: &CodecJob) -> Result<(), CodecError> {
        self.calls.lock().unwrap().push(job.name.clone());
        if self.failing.contains(&job.name) {
            return Err(CodecError::Other(format!("cannot decode {}", job.name)));
        }
        if self.write_output {
            std::fs::write(&job.output, b"II*\0").map_err(CodecError::Spawn)?;
        }
        Ok(())
    }
}

/// Sink that keeps every stored manifest text in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub saved: Vec<String>,
}

impl ManifestSink for MemorySink {
    fn store(&mut self, manifest: &Manifest) -> Result<(), ManifestError> {
        self.saved.push(manifest.serialize());
        Ok(())
    }
}

/// Sink that fails a fixed number of times, then stores in memory
#[derive(Debug, Default)]
pub struct FailingSink {
    pub failures_left: usize,
    pub attempts: usize,
    pub saved: Vec<String>,
}

impl FailingSink {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: times,
            ..Self::default()
        }
    }
}

impl ManifestSink for FailingSink {
    fn store(&mut self, manifest: &Manifest) -> Result<(), ManifestError> {
        self.attempts += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(ManifestError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "manifest is read-only",
            )));
        }
        self.saved.push(manifest.serialize());
        Ok(())
    }
}

/// Write a manifest file plus a placeholder file for every page it names
pub fn write_fixture(dir: &Path, manifest_name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(manifest_name);
    std::fs::write(&path, text).unwrap();
    let manifest = Manifest::parse(text).unwrap();
    for page in manifest.documents().iter().flat_map(|d| d.pages()) {
        let file = page.path(dir);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(file, b"\xFF\xD8\xFF").unwrap();
    }
    path
}
