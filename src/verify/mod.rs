//! Manifest audit against the files on disk
//!
//! Finds pages whose file is missing: converted pages without a TIFF (split
//! by whether the JPG is still around to redo the conversion) and pending
//! pages without a JPG. The manifest itself is never changed.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::convert::{Codec, CodecJob};
use crate::manifest::{Extension, Manifest};
use crate::output::{OutputWriter, short_name};

/// A page reference located in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub document: usize,
    pub row: usize,
    pub target: String,
    /// Resolved path of the file the manifest expects
    pub path: PathBuf,
    /// JPG a missing TIFF can be re-created from
    pub source: Option<PathBuf>,
}

/// Missing files, each list in document then row order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// `tif` pages without a TIFF whose JPG still exists
    pub repairable: Vec<PageRef>,
    /// `tif` pages with neither TIFF nor JPG
    pub unrecoverable: Vec<PageRef>,
    /// `jpg` pages whose JPG is missing
    pub missing_jpgs: Vec<PageRef>,
}

impl AuditReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.repairable.is_empty() && self.unrecoverable.is_empty() && self.missing_jpgs.is_empty()
    }

    #[must_use]
    pub fn problem_count(&self) -> usize {
        self.repairable.len() + self.unrecoverable.len() + self.missing_jpgs.len()
    }
}

/// Check every page of `manifest` against the disk under `base_dir`
#[must_use]
pub fn audit(manifest: &Manifest, base_dir: &Path) -> AuditReport {
    let mut report = AuditReport::default();

    for (d, doc) in manifest.documents().iter().enumerate() {
        for (r, page) in doc.pages().iter().enumerate() {
            let path = page.path(base_dir);
            if path.exists() {
                continue;
            }
            let mut page_ref = PageRef {
                document: d,
                row: r,
                target: doc.target().to_string(),
                path,
                source: None,
            };
            match page.extension() {
                Extension::Jpg => report.missing_jpgs.push(page_ref),
                Extension::Tif => {
                    page_ref.source = find_source(&page.path_with(base_dir, Extension::Jpg));
                    if page_ref.source.is_some() {
                        report.repairable.push(page_ref);
                    } else {
                        report.unrecoverable.push(page_ref);
                    }
                }
            }
        }
    }

    debug!(problems = report.problem_count(), "audit finished");
    report
}

/// Existing JPG next to a TIFF, trying the lowercase and uppercase spelling
fn find_source(jpg: &Path) -> Option<PathBuf> {
    if jpg.exists() {
        return Some(jpg.to_path_buf());
    }
    let upper = jpg.with_extension("JPG");
    upper.exists().then_some(upper)
}

/// Re-create missing TIFFs from their JPGs. Returns how many were produced.
pub fn repair(report: &AuditReport, codec: &dyn Codec, output: &dyn OutputWriter) -> usize {
    let mut repaired = 0;
    for page in &report.repairable {
        let Some(source) = &page.source else {
            continue;
        };
        let job = CodecJob {
            name: short_name(source),
            source: source.clone(),
            output: page.path.clone(),
        };
        output.info(&format!("Converting {}...", job.name));
        match codec.convert(&job) {
            Ok(()) => {
                repaired += 1;
                output.success(&format!("Created missing TIFF: {}", short_name(&job.output)));
            }
            Err(e) => output.error(&format!("Error converting {}: {e}", job.name)),
        }
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{BufferedWriter, MessageLevel};
    use crate::testing::FakeCodec;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_clean_manifest() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "b.tif");
        let m = Manifest::parse("doc,a.jpg,b.tif\n").unwrap();
        let report = audit(&m, dir.path());
        assert!(report.is_clean());
        assert_eq!(report.problem_count(), 0);
    }

    #[test]
    fn test_classifies_missing_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "fixable.jpg");
        let m = Manifest::parse("doc,fixable.tif,lost.tif\ndoc2,gone.jpg\n").unwrap();

        let report = audit(&m, dir.path());

        assert_eq!(report.repairable.len(), 1);
        assert_eq!(report.repairable[0].path, dir.path().join("fixable.tif"));
        assert_eq!(report.unrecoverable.len(), 1);
        assert_eq!(report.unrecoverable[0].row, 1);
        assert_eq!(report.missing_jpgs.len(), 1);
        assert_eq!(report.missing_jpgs[0].document, 1);
        assert_eq!(report.missing_jpgs[0].target, "doc2");
    }

    #[test]
    fn test_repair_runs_codec_for_repairable_only() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "p1.jpg");
        touch(dir.path(), "p2.jpg");
        let m = Manifest::parse("doc,p1.tif,p2.tif,p3.tif\n").unwrap();
        let report = audit(&m, dir.path());
        let codec = FakeCodec::failing(&["p2.jpg"]).writing_output();
        let out = BufferedWriter::new();

        let repaired = repair(&report, &codec, &out);

        assert_eq!(repaired, 1);
        assert_eq!(codec.calls(), vec!["p1.jpg", "p2.jpg"]);
        assert!(dir.path().join("p1.tif").exists());
        assert_eq!(out.messages_at(MessageLevel::Error).len(), 1);
        assert!(audit(&m, dir.path()).repairable.len() == 1);
    }

    #[test]
    fn test_uppercase_extensions_found_on_disk() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "A.JPG");
        touch(dir.path(), "B.TIF");
        touch(dir.path(), "C.JPG");
        let m = Manifest::parse("doc,A.JPG,B.TIF,C.tif\n").unwrap();

        let report = audit(&m, dir.path());

        assert!(report.missing_jpgs.is_empty());
        assert_eq!(report.repairable.len(), 1);
        assert_eq!(report.repairable[0].source, Some(dir.path().join("C.JPG")));

        let codec = FakeCodec::ok().writing_output();
        assert_eq!(repair(&report, &codec, &BufferedWriter::new()), 1);
        assert_eq!(codec.calls(), vec!["C.JPG"]);
        assert!(audit(&m, dir.path()).is_clean());
    }
}
