//! Manifest session
//!
//! A [`Session`] owns one loaded manifest together with its derived registry
//! and selection. It is the surface a front-end drives: load a list, tick
//! pages, convert, and retry a failed save.
//!
//! The registry and selection are rebuilt explicitly after every load and
//! every successful save. They are never patched in place.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::convert::{
    apply_original_policy, ConversionReport, Coordinator, FileSink, ManifestSink, PersistStatus,
};
use crate::manifest::{Manifest, ManifestError};
use crate::registry::{EntryId, Registry};
use crate::selection::Selection;

type Result<T> = std::result::Result<T, ManifestError>;

/// One load → mutate → save cycle over a manifest file
#[derive(Debug)]
pub struct Session {
    path: PathBuf,
    base_dir: PathBuf,
    manifest: Manifest,
    registry: Registry,
    selection: Selection,
    /// Sources of conversions whose manifest save has not succeeded yet
    unsaved_sources: Vec<PathBuf>,
}

impl Session {
    /// Load a manifest file and build its registry.
    ///
    /// Relative page names resolve against the manifest's directory.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError` if the file cannot be read or any row is malformed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let manifest = Manifest::load(&path)?;
        let base_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let registry = Registry::build(&manifest);
        info!(
            path = %path.display(),
            documents = manifest.documents().len(),
            pending = registry.len(),
            "session loaded"
        );
        Ok(Self {
            path,
            base_dir,
            manifest,
            registry,
            selection: Selection::new(),
            unsaved_sources: Vec::new(),
        })
    }

    /// Re-read the manifest from disk, discarding in-memory state.
    ///
    /// On error the current state is kept untouched.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError` if the file cannot be read or parsed.
    pub fn reload(&mut self) -> Result<()> {
        let manifest = Manifest::load(&self.path)?;
        if !self.unsaved_sources.is_empty() {
            warn!(
                pending = self.unsaved_sources.len(),
                "reloading with unsaved conversions"
            );
        }
        self.manifest = manifest;
        self.unsaved_sources.clear();
        self.rebuild();
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory page names are resolved against
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn selection(&self) -> &Selection {
        &self.selection
    }

    /// True if conversions are recorded in memory but not yet saved
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        !self.unsaved_sources.is_empty()
    }

    pub fn tick(&mut self, id: &EntryId) -> bool {
        self.selection.tick(&self.registry, id)
    }

    pub fn untick(&mut self, id: &EntryId) -> bool {
        self.selection.untick(&self.registry, id)
    }

    pub fn toggle(&mut self, id: &EntryId) -> Option<bool> {
        self.selection.toggle(&self.registry, id)
    }

    pub fn set_active(&mut self, id: &EntryId) {
        self.selection.set_active(&self.registry, id);
    }

    /// Tick every pending page
    pub fn tick_all(&mut self) {
        for entry in self.registry.entries() {
            self.selection.tick(&self.registry, &entry.id);
        }
    }

    /// Convert the ticked pages, saving to the manifest file
    pub fn convert_ticked(&mut self, coordinator: &Coordinator<'_>) -> ConversionReport {
        let mut sink = FileSink::new(&self.path);
        self.convert_ticked_with(coordinator, &mut sink)
    }

    /// Convert the ticked pages, saving through `sink`.
    ///
    /// After a successful save the registry is rebuilt and the selection
    /// cleared. After a failed save both are left as they were and the
    /// converted pages wait for [`Session::retry_save`].
    pub fn convert_ticked_with(
        &mut self,
        coordinator: &Coordinator<'_>,
        sink: &mut dyn ManifestSink,
    ) -> ConversionReport {
        let ids = self.selection.ticked_in(&self.registry);
        let report = coordinator.convert(&mut self.manifest, &self.registry, &ids, sink);

        match report.persist() {
            PersistStatus::Saved => {
                // The save also recorded any earlier batch whose save failed
                let earlier = std::mem::take(&mut self.unsaved_sources);
                if !earlier.is_empty() {
                    info!(recorded = earlier.len(), "earlier unsaved conversions saved");
                    apply_original_policy(coordinator.original_policy(), &earlier, coordinator.output());
                }
                self.rebuild();
            }
            PersistStatus::Failed(_) => {
                self.unsaved_sources
                    .extend(report.converted_files().iter().map(|(src, _)| src.clone()));
            }
            PersistStatus::NotAttempted => {}
        }
        report
    }

    /// Save the manifest file again after a failed save
    ///
    /// # Errors
    ///
    /// Returns `ManifestError` if the save fails again.
    pub fn retry_save(&mut self, coordinator: &Coordinator<'_>) -> Result<()> {
        let mut sink = FileSink::new(&self.path);
        self.retry_save_with(coordinator, &mut sink)
    }

    /// Save through `sink` without re-running any codec work.
    ///
    /// On success the registry is rebuilt and, under
    /// [`crate::convert::OriginalPolicy::Delete`], the JPGs of the now-recorded conversions
    /// are removed.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError` if the save fails again; state is kept for
    /// another retry.
    pub fn retry_save_with(
        &mut self,
        coordinator: &Coordinator<'_>,
        sink: &mut dyn ManifestSink,
    ) -> Result<()> {
        sink.store(&self.manifest)?;
        info!(recorded = self.unsaved_sources.len(), "manifest saved on retry");

        let sources = std::mem::take(&mut self.unsaved_sources);
        apply_original_policy(coordinator.original_policy(), &sources, coordinator.output());
        self.rebuild();
        Ok(())
    }

    /// Invalidate derived views: rebuild the registry, clear the selection
    fn rebuild(&mut self) {
        self.registry = Registry::build(&self.manifest);
        self.selection.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{EntryOutcome, OriginalPolicy, SkipReason};
    use crate::testing::{write_fixture, FailingSink, FakeCodec};
    use tempfile::TempDir;

    const TEXT: &str = "doc1,page1.jpg,page2.jpg,page3.tif\ndoc2,b1.jpg\n";

    fn open(dir: &TempDir) -> Session {
        let path = write_fixture(dir.path(), "list.csv", TEXT);
        Session::load(path).unwrap()
    }

    #[test]
    fn test_load_builds_registry() {
        let dir = TempDir::new().unwrap();
        let session = open(&dir);
        assert_eq!(session.registry().len(), 3);
        assert_eq!(session.base_dir(), dir.path());
        assert_eq!(session.selection().ticked_count(), 0);
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_load_rejects_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "doc1,ok.jpg\ndoc2,weird.png\n").unwrap();
        let err = Session::load(&path).unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_convert_ticked_saves_and_rebuilds() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir);
        let codec = FakeCodec::ok().writing_output();
        let coordinator = Coordinator::new(&codec, session.base_dir().to_path_buf());

        let id = EntryId::new(0, 0, "page1");
        assert!(session.tick(&id));
        session.set_active(&id);
        let report = session.convert_ticked(&coordinator);

        assert_eq!(report.outcome(&id), Some(&EntryOutcome::Converted));
        assert_eq!(
            std::fs::read_to_string(session.path()).unwrap(),
            "doc1,page1.tif,page2.jpg,page3.tif\ndoc2,b1.jpg\n"
        );
        assert!(!session.registry().contains(&id));
        assert_eq!(session.registry().len(), 2);
        assert_eq!(session.selection().ticked_count(), 0);
        assert!(session.selection().active().is_none());
    }

    #[test]
    fn test_stale_tick_after_rebuild_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir);
        let codec = FakeCodec::ok();
        let coordinator = Coordinator::new(&codec, session.base_dir().to_path_buf());
        let id = EntryId::new(1, 0, "b1");

        session.tick(&id);
        session.convert_ticked(&coordinator);

        assert!(!session.tick(&id));
        assert_eq!(session.toggle(&id), None);
    }

    #[test]
    fn test_convert_with_nothing_ticked() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir);
        let codec = FakeCodec::ok();
        let coordinator = Coordinator::new(&codec, session.base_dir().to_path_buf());

        let report = session.convert_ticked(&coordinator);

        assert!(report.outcomes().is_empty());
        assert_eq!(std::fs::read_to_string(session.path()).unwrap(), TEXT);
    }

    #[test]
    fn test_failed_save_then_retry() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir);
        let codec = FakeCodec::ok().writing_output();
        let coordinator = Coordinator::new(&codec, session.base_dir().to_path_buf())
            .with_original_policy(OriginalPolicy::Delete);
        let mut sink = FailingSink::failing(1);

        session.tick_all();
        let report = session.convert_ticked_with(&coordinator, &mut sink);

        assert!(report.is_persist_failed());
        assert_eq!(report.converted().len(), 3);
        assert!(session.has_unsaved_changes());
        // Derived views are only rebuilt after a successful save
        assert_eq!(session.registry().len(), 3);
        assert!(dir.path().join("page1.jpg").exists());

        session.retry_save_with(&coordinator, &mut sink).unwrap();

        assert!(!session.has_unsaved_changes());
        assert!(session.registry().is_empty());
        assert_eq!(
            sink.saved,
            vec!["doc1,page1.tif,page2.tif,page3.tif\ndoc2,b1.tif\n".to_string()]
        );
        assert_eq!(codec.calls().len(), 3);
        assert!(!dir.path().join("page1.jpg").exists());
        assert!(dir.path().join("page1.tif").exists());
    }

    #[test]
    fn test_later_save_records_earlier_unsaved_batch() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir);
        let codec = FakeCodec::ok().writing_output();
        let coordinator = Coordinator::new(&codec, session.base_dir().to_path_buf())
            .with_original_policy(OriginalPolicy::Delete);
        let mut sink = FailingSink::failing(1);

        session.tick(&EntryId::new(0, 0, "page1"));
        let first = session.convert_ticked_with(&coordinator, &mut sink);
        assert!(first.is_persist_failed());
        assert!(session.has_unsaved_changes());

        session.tick(&EntryId::new(1, 0, "b1"));
        let second = session.convert_ticked_with(&coordinator, &mut sink);

        assert_eq!(second.persist(), &PersistStatus::Saved);
        assert!(!session.has_unsaved_changes());
        assert_eq!(
            sink.saved,
            vec!["doc1,page1.tif,page2.jpg,page3.tif\ndoc2,b1.tif\n".to_string()]
        );
        assert!(!dir.path().join("page1.jpg").exists());
        assert!(!dir.path().join("b1.jpg").exists());
        assert!(dir.path().join("page2.jpg").exists());
        assert_eq!(session.registry().len(), 1);
    }

    #[test]
    fn test_retry_failure_keeps_state() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir);
        let codec = FakeCodec::ok();
        let coordinator = Coordinator::new(&codec, session.base_dir().to_path_buf());
        let mut sink = FailingSink::failing(2);

        session.tick(&EntryId::new(0, 1, "page2"));
        session.convert_ticked_with(&coordinator, &mut sink);
        assert!(session.retry_save_with(&coordinator, &mut sink).is_err());
        assert!(session.has_unsaved_changes());
        session.retry_save_with(&coordinator, &mut sink).unwrap();
        assert_eq!(sink.attempts, 3);
    }

    #[test]
    fn test_pending_tick_of_unsaved_page_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir);
        let codec = FakeCodec::ok();
        let coordinator = Coordinator::new(&codec, session.base_dir().to_path_buf());
        let mut sink = FailingSink::failing(10);
        let id = EntryId::new(0, 0, "page1");

        session.tick(&id);
        session.convert_ticked_with(&coordinator, &mut sink);
        let second = session.convert_ticked_with(&coordinator, &mut sink);

        assert_eq!(second.outcome(&id), Some(&EntryOutcome::Skipped(SkipReason::Stale)));
        assert_eq!(codec.calls().len(), 1);
    }

    #[test]
    fn test_reload_discards_state() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir);
        session.tick_all();
        std::fs::write(session.path(), "doc1,x.jpg\n").unwrap();

        session.reload().unwrap();

        assert_eq!(session.registry().len(), 1);
        assert_eq!(session.selection().ticked_count(), 0);
    }

    #[test]
    fn test_reload_failure_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir);
        session.tick_all();
        std::fs::write(session.path(), "doc1,x.gif\n").unwrap();

        assert!(session.reload().is_err());
        assert_eq!(session.registry().len(), 3);
        assert_eq!(session.selection().ticked_count(), 3);
    }
}
