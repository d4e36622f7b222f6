//! Conversion coordinator
//!
//! Runs the codec for a batch of registry entries and reconciles the manifest
//! with the results:
//!
//! 1. Each requested entry is checked against the registry snapshot and the
//!    manifest. Stale entries are skipped before any codec work.
//! 2. Codec calls run on a worker pool. Each worker sends its result over a
//!    channel to the calling thread, which is the only writer of the manifest
//!    and flips one page to `tif` per successful result.
//! 3. If anything converted, the manifest is saved once through a
//!    [`ManifestSink`]. A failed save leaves the converted extensions in memory
//!    so the save can be retried without re-running the codec.
//!
//! One failing page never stops the rest of the batch; every requested page
//! gets its own [`EntryOutcome`].

pub mod codec;
pub mod error;

pub use codec::{
    apply_original_policy, Codec, CodecJob, CommandCodec, OriginalPolicy, DEFAULT_COMMAND,
};
pub use error::CodecError;

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use tracing::{debug, error, info, warn};

use crate::manifest::{Extension, Manifest, ManifestError};
use crate::output::{OutputWriter, short_name};
use crate::registry::{EntryId, Registry};

/// Upper bound for the default worker count
const MAX_DEFAULT_WORKERS: usize = 8;

/// Worker count used when none is configured: CPU count, capped at 8
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map_or(2, std::num::NonZeroUsize::get)
        .clamp(1, MAX_DEFAULT_WORKERS)
}

/// Persistent store for a manifest
pub trait ManifestSink {
    /// Persist `manifest`
    ///
    /// # Errors
    ///
    /// Returns `ManifestError` if the manifest could not be written.
    fn store(&mut self, manifest: &Manifest) -> Result<(), ManifestError>;
}

/// Sink that writes the manifest file in place
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ManifestSink for FileSink {
    fn store(&mut self, manifest: &Manifest) -> Result<(), ManifestError> {
        manifest.save(&self.path)
    }
}

/// Reason an entry was not handed to the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not in the registry snapshot, or no longer a JPG in the manifest
    Stale,
    /// The batch was cancelled before this entry started
    Cancelled,
}

/// Result for one requested entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Converted,
    Failed(String),
    Skipped(SkipReason),
}

/// What happened to the manifest save at the end of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistStatus {
    /// Nothing converted, so nothing was saved
    NotAttempted,
    Saved,
    /// Conversions are recorded in memory but not on disk
    Failed(String),
}

/// Per-entry results of one batch plus the save status
#[derive(Debug, Clone)]
pub struct ConversionReport {
    outcomes: Vec<(EntryId, EntryOutcome)>,
    persist: PersistStatus,
    converted_files: Vec<(PathBuf, PathBuf)>,
}

impl ConversionReport {
    /// Outcomes in request order, one per distinct requested entry
    #[must_use]
    pub fn outcomes(&self) -> &[(EntryId, EntryOutcome)] {
        &self.outcomes
    }

    #[must_use]
    pub fn outcome(&self, id: &EntryId) -> Option<&EntryOutcome> {
        self.outcomes.iter().find(|(i, _)| i == id).map(|(_, o)| o)
    }

    #[must_use]
    pub fn converted(&self) -> Vec<&EntryId> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == EntryOutcome::Converted)
            .map(|(id, _)| id)
            .collect()
    }

    #[must_use]
    pub fn failed(&self) -> Vec<(&EntryId, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(id, o)| match o {
                EntryOutcome::Failed(reason) => Some((id, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn skipped(&self) -> Vec<(&EntryId, SkipReason)> {
        self.outcomes
            .iter()
            .filter_map(|(id, o)| match o {
                EntryOutcome::Skipped(reason) => Some((id, *reason)),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub const fn persist(&self) -> &PersistStatus {
        &self.persist
    }

    /// True if pages converted but the manifest save failed
    #[must_use]
    pub const fn is_persist_failed(&self) -> bool {
        matches!(self.persist, PersistStatus::Failed(_))
    }

    /// (JPG, TIFF) path pairs, one per converted file
    #[must_use]
    pub fn converted_files(&self) -> &[(PathBuf, PathBuf)] {
        &self.converted_files
    }

    /// True when every entry converted and the manifest was saved
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| *o == EntryOutcome::Converted)
            && !self.is_persist_failed()
    }
}

enum JobResult {
    Done(Result<(), CodecError>),
    Cancelled,
}

/// One codec call and the request slots it answers
struct Planned {
    job: CodecJob,
    slots: Vec<usize>,
}

/// Applies codec results to a manifest
pub struct Coordinator<'a> {
    codec: &'a dyn Codec,
    base_dir: PathBuf,
    workers: usize,
    original_policy: OriginalPolicy,
    output: Option<&'a dyn OutputWriter>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Coordinator<'a> {
    /// Coordinator resolving relative page names against `base_dir`
    #[must_use]
    pub fn new(codec: &'a dyn Codec, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            codec,
            base_dir: base_dir.into(),
            workers: default_workers(),
            original_policy: OriginalPolicy::default(),
            output: None,
            cancel: None,
        }
    }

    /// Set the worker count; 0 selects [`default_workers`]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 { default_workers() } else { workers };
        self
    }

    #[must_use]
    pub const fn with_original_policy(mut self, policy: OriginalPolicy) -> Self {
        self.original_policy = policy;
        self
    }

    /// Send progress messages to `output`
    #[must_use]
    pub const fn with_output(mut self, output: &'a dyn OutputWriter) -> Self {
        self.output = Some(output);
        self
    }

    /// Entries not yet started when `flag` becomes true are skipped
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub const fn original_policy(&self) -> OriginalPolicy {
        self.original_policy
    }

    #[must_use]
    pub const fn output(&self) -> Option<&'a dyn OutputWriter> {
        self.output
    }

    /// Codec job for `id`, or `None` if the entry is stale
    #[must_use]
    pub fn plan(&self, manifest: &Manifest, registry: &Registry, id: &EntryId) -> Option<CodecJob> {
        if !registry.contains(id) {
            return None;
        }
        let page = manifest.page(id.document, id.row)?;
        if !page.is_pending() || page.name() != id.name {
            return None;
        }
        Some(CodecJob {
            name: page.file_name(),
            source: page.path(&self.base_dir),
            output: page.path_with(&self.base_dir, Extension::Tif),
        })
    }

    /// Convert `requested` entries and save the manifest if anything changed.
    ///
    /// Duplicate identities are processed once, and entries naming the same
    /// file share one codec call. The manifest is mutated only on this thread,
    /// one result at a time, as codec results arrive. A converted file is
    /// recorded on every pending row that names it.
    pub fn convert(
        &self,
        manifest: &mut Manifest,
        registry: &Registry,
        requested: &[EntryId],
        sink: &mut dyn ManifestSink,
    ) -> ConversionReport {
        let mut seen = HashSet::new();
        let ids: Vec<&EntryId> = requested.iter().filter(|id| seen.insert(*id)).collect();

        let mut outcomes: Vec<Option<EntryOutcome>> = vec![None; ids.len()];
        let mut planned: Vec<Planned> = Vec::new();
        let mut by_output: HashMap<PathBuf, usize> = HashMap::new();
        for (slot, id) in ids.iter().enumerate() {
            let Some(job) = self.plan(manifest, registry, id) else {
                debug!(%id, "skipping stale entry");
                outcomes[slot] = Some(EntryOutcome::Skipped(SkipReason::Stale));
                continue;
            };
            match by_output.get(&job.output).copied() {
                Some(i) if planned[i].job.source == job.source => planned[i].slots.push(slot),
                Some(i) => {
                    outcomes[slot] = Some(EntryOutcome::Failed(format!(
                        "{} is already produced from {} in this batch",
                        short_name(&job.output),
                        planned[i].job.name
                    )));
                }
                None => {
                    by_output.insert(job.output.clone(), planned.len());
                    planned.push(Planned {
                        job,
                        slots: vec![slot],
                    });
                }
            }
        }

        let mut converted_files = Vec::new();
        if !planned.is_empty() {
            info!(files = planned.len(), workers = self.workers, "starting conversion batch");
            self.run_jobs(manifest, &planned, &mut outcomes, &mut converted_files);
        }

        let outcomes: Vec<(EntryId, EntryOutcome)> = ids
            .into_iter()
            .zip(outcomes)
            .map(|(id, o)| {
                (
                    id.clone(),
                    o.unwrap_or(EntryOutcome::Skipped(SkipReason::Cancelled)),
                )
            })
            .collect();

        let persist = if converted_files.is_empty() {
            PersistStatus::NotAttempted
        } else {
            match sink.store(manifest) {
                Ok(()) => {
                    info!(converted = converted_files.len(), "manifest saved");
                    let sources: Vec<PathBuf> =
                        converted_files.iter().map(|(src, _)| src.clone()).collect();
                    apply_original_policy(self.original_policy, &sources, self.output);
                    PersistStatus::Saved
                }
                Err(e) => {
                    error!(error = %e, "manifest save failed after conversion");
                    self.emit(|o| {
                        o.error(&format!(
                            "Converted {} page(s) but failed to update manifest: {e}",
                            converted_files.len()
                        ));
                    });
                    PersistStatus::Failed(e.to_string())
                }
            }
        };

        ConversionReport {
            outcomes,
            persist,
            converted_files,
        }
    }

    fn run_jobs(
        &self,
        manifest: &mut Manifest,
        planned: &[Planned],
        outcomes: &mut [Option<EntryOutcome>],
        converted_files: &mut Vec<(PathBuf, PathBuf)>,
    ) {
        let (tx, rx) = mpsc::channel::<(usize, JobResult)>();

        match rayon::ThreadPoolBuilder::new().num_threads(self.workers).build() {
            Ok(pool) => pool.in_place_scope(|scope| {
                for (i, p) in planned.iter().enumerate() {
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        let _ = tx.send((i, self.run_job(&p.job)));
                    });
                }
                drop(tx);
                self.apply_results(manifest, planned, &rx, outcomes, converted_files);
            }),
            Err(e) => {
                warn!(error = %e, "could not start worker pool, converting sequentially");
                for (i, p) in planned.iter().enumerate() {
                    let _ = tx.send((i, self.run_job(&p.job)));
                }
                drop(tx);
                self.apply_results(manifest, planned, &rx, outcomes, converted_files);
            }
        }
    }

    /// Run the codec for one job. A panicking codec fails only its own page.
    fn run_job(&self, job: &CodecJob) -> JobResult {
        if self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed)) {
            return JobResult::Cancelled;
        }
        self.emit(|o| o.info(&format!("Converting {}...", job.name)));
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.codec.convert(job)))
            .unwrap_or_else(|payload| Err(CodecError::Panicked(panic_message(payload.as_ref()))));
        JobResult::Done(result)
    }

    /// Single writer: the only place a batch mutates the manifest
    fn apply_results(
        &self,
        manifest: &mut Manifest,
        planned: &[Planned],
        rx: &mpsc::Receiver<(usize, JobResult)>,
        outcomes: &mut [Option<EntryOutcome>],
        converted_files: &mut Vec<(PathBuf, PathBuf)>,
    ) {
        for (i, result) in rx {
            let Planned { job, slots } = &planned[i];
            let outcome = match result {
                JobResult::Done(Ok(())) => {
                    let recorded = self.record_conversion(manifest, &job.source);
                    if recorded == 0 {
                        EntryOutcome::Skipped(SkipReason::Stale)
                    } else {
                        converted_files.push((job.source.clone(), job.output.clone()));
                        debug!(file = %job.name, rows = recorded, "converted");
                        self.emit(|o| {
                            o.success(&format!("Converted: {}", short_name(&job.output)));
                        });
                        EntryOutcome::Converted
                    }
                }
                JobResult::Done(Err(e)) => {
                    warn!(file = %job.name, error = %e, "conversion failed");
                    self.emit(|o| o.error(&format!("Error converting {}: {e}", job.name)));
                    EntryOutcome::Failed(e.to_string())
                }
                JobResult::Cancelled => EntryOutcome::Skipped(SkipReason::Cancelled),
            };
            for &slot in slots {
                outcomes[slot] = Some(outcome.clone());
            }
        }
    }

    /// Flip every pending page whose JPG resolves to `source`. Returns how many.
    fn record_conversion(&self, manifest: &mut Manifest, source: &Path) -> usize {
        let mut recorded = 0;
        for page in manifest.pages_mut().filter(|p| p.is_pending()) {
            if page.path(&self.base_dir).as_path() == source {
                page.mark_converted();
                recorded += 1;
            }
        }
        recorded
    }

    fn emit(&self, f: impl FnOnce(&dyn OutputWriter)) {
        if let Some(out) = self.output {
            f(out);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
