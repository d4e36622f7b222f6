//! Convert command - convert selected pages and update the manifest

use std::path::Path;

use colored::Colorize;
use dialoguer::Confirm;

use crate::{
    G4TrackError,
    config::G4TrackConfig,
    convert::{CommandCodec, ConversionReport, Coordinator, OriginalPolicy, PersistStatus, SkipReason},
    output::StdoutWriter,
    registry::{EntryId, Registry, RegistryEntry},
    session::Session,
};

type Result<T> = std::result::Result<T, G4TrackError>;

/// Parsed options of the convert command
#[derive(Debug, Clone, Default)]
pub struct ConvertArgs {
    pub pages: Vec<String>,
    pub all: bool,
    pub patterns: Vec<String>,
    pub dry_run: bool,
    pub yes: bool,
    pub workers: Option<usize>,
    pub delete_originals: bool,
}

/// Execute the convert command
///
/// # Errors
///
/// Returns `G4TrackError` if the manifest cannot be loaded, no page is
/// selected, a selector matches nothing, any page fails to convert, or the
/// manifest could not be updated.
pub fn execute(
    manifest_path: &Path,
    args: &ConvertArgs,
    config: &G4TrackConfig,
    quiet: bool,
) -> Result<()> {
    let mut session = Session::load(manifest_path)?;

    if session.registry().is_empty() {
        if !quiet {
            println!("No pages waiting for conversion.");
        }
        return Ok(());
    }

    let ids = select_entries(session.registry(), &args.pages, &args.patterns, args.all)?;
    if ids.is_empty() {
        return Err(G4TrackError::InvalidInput(
            "No pages selected. Name pages, use --pattern, or --all".into(),
        ));
    }
    for id in &ids {
        session.tick(id);
    }
    let ticked = session.selection().ticked_in(session.registry());

    if args.dry_run {
        print_dry_run(session.registry(), &ticked);
        return Ok(());
    }

    if !args.yes && !quiet {
        let prompt = format!(
            "Convert {} page(s) from '{}' to G4 TIFF?",
            ticked.len(),
            manifest_path.display()
        );
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .interact()
            .map_err(|e| G4TrackError::InvalidInput(format!("Failed to get confirmation: {e}")))?;
        if !confirmed {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    let policy = if args.delete_originals {
        OriginalPolicy::Delete
    } else {
        config.original_policy
    };
    let codec = CommandCodec::new(config.codec_command.clone());
    let output = StdoutWriter::new(quiet);
    let coordinator = Coordinator::new(&codec, session.base_dir().to_path_buf())
        .with_workers(args.workers.unwrap_or_else(|| config.worker_count()))
        .with_original_policy(policy)
        .with_output(&output);

    let report = session.convert_ticked(&coordinator);
    if !quiet {
        print_report(&report);
    }

    if report.is_persist_failed() {
        retry_save(&mut session, &coordinator, args.yes || quiet)?;
    }

    let failed = report.failed().len();
    if failed > 0 {
        return Err(G4TrackError::Incomplete(format!(
            "{failed} page(s) failed to convert; they remain pending in the manifest"
        )));
    }
    Ok(())
}

/// Resolve page selectors against the registry.
///
/// A selector matches an entry by file name (`page1.jpg`, case-insensitive),
/// by base name (`page1`) or by coordinate (`DOC:ROW`). Patterns are globs
/// over the file name.
///
/// # Errors
///
/// Returns `G4TrackError::InvalidInput` if a selector matches no pending page
/// or a pattern is not a valid glob.
pub fn select_entries(
    registry: &Registry,
    pages: &[String],
    patterns: &[String],
    all: bool,
) -> Result<Vec<EntryId>> {
    if all {
        return Ok(registry.iter().map(|e| e.id.clone()).collect());
    }

    let mut selected = Vec::new();
    for page in pages {
        let before = selected.len();
        selected.extend(
            registry
                .iter()
                .filter(|e| matches_selector(e, page))
                .map(|e| e.id.clone()),
        );
        if selected.len() == before {
            return Err(G4TrackError::InvalidInput(format!(
                "No pending page matches '{page}'"
            )));
        }
    }

    for pattern in patterns {
        let glob = glob::Pattern::new(pattern).map_err(|e| {
            G4TrackError::InvalidInput(format!("Invalid pattern '{pattern}': {e}"))
        })?;
        selected.extend(
            registry
                .iter()
                .filter(|e| glob.matches(&e.file_name))
                .map(|e| e.id.clone()),
        );
    }

    Ok(selected)
}

fn matches_selector(entry: &RegistryEntry, selector: &str) -> bool {
    if let Some((d, r)) = selector.split_once(':')
        && let (Ok(d), Ok(r)) = (d.parse::<usize>(), r.parse::<usize>())
    {
        return entry.id.document == d && entry.id.row == r;
    }
    entry.file_name.eq_ignore_ascii_case(selector) || entry.id.name == selector
}

fn print_dry_run(registry: &Registry, ids: &[EntryId]) {
    println!("{}", "=== Dry Run Mode ===".yellow().bold());
    println!("Would convert {} page(s) to G4 TIFF", ids.len());
    for (i, id) in ids.iter().enumerate().take(10) {
        if let Some(entry) = registry.get(id) {
            println!("  {}. {} [{}]", i + 1, entry, entry.target);
        }
    }
    if ids.len() > 10 {
        println!("  ... and {} more", ids.len() - 10);
    }
    println!("\n{}", "Run without --dry-run to apply changes.".yellow());
}

/// Print the per-page outcome summary
pub fn print_report(report: &ConversionReport) {
    let failed = report.failed();
    let skipped = report.skipped();

    println!("\n{}", "=== Convert Summary ===".bold());
    println!("  {} {}", "✓ Converted:".green(), report.converted().len());
    if !skipped.is_empty() {
        let cancelled = skipped.iter().filter(|(_, r)| *r == SkipReason::Cancelled).count();
        println!(
            "  {} {} ({} stale, {} cancelled)",
            "⊘ Skipped:".yellow(),
            skipped.len(),
            skipped.len() - cancelled,
            cancelled
        );
    }
    if !failed.is_empty() {
        println!("  {} {}", "✗ Failed:".red(), failed.len());
        println!("\n{}", "Failed pages:".red().bold());
        for (id, reason) in &failed {
            println!("  - {id}: {reason}");
        }
    }
    match report.persist() {
        PersistStatus::Saved => println!("\nManifest updated."),
        PersistStatus::Failed(e) => println!(
            "\n{} {e}",
            "Manifest NOT updated; converted TIFFs exist on disk:".red().bold()
        ),
        PersistStatus::NotAttempted => println!("\nManifest unchanged."),
    }
}

fn retry_save(session: &mut Session, coordinator: &Coordinator<'_>, non_interactive: bool) -> Result<()> {
    loop {
        let again = non_interactive
            || Confirm::new()
                .with_prompt("Retry saving the manifest?")
                .default(true)
                .interact()
                .map_err(|e| G4TrackError::InvalidInput(format!("Failed to get confirmation: {e}")))?;
        if !again {
            break;
        }
        match session.retry_save(coordinator) {
            Ok(()) => {
                println!("Manifest updated.");
                return Ok(());
            }
            Err(e) => {
                eprintln!("{} {e}", "✗".red());
                if non_interactive {
                    break;
                }
            }
        }
    }
    Err(G4TrackError::Incomplete(format!(
        "Pages were converted but '{}' was not updated",
        session.path().display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    fn registry() -> Registry {
        Registry::build(
            &Manifest::parse("doc1,cover.jpg,page1.jpg,page2.tif\ndoc2,Cover.JPG,p9.jpg\n").unwrap(),
        )
    }

    #[test]
    fn test_select_all() {
        let ids = select_entries(&registry(), &[], &[], true).unwrap();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_select_by_name_and_coordinate() {
        let reg = registry();
        let ids = select_entries(&reg, &["page1.jpg".into(), "1:1".into()], &[], false).unwrap();
        assert_eq!(ids, vec![EntryId::new(0, 1, "page1"), EntryId::new(1, 1, "p9")]);

        let by_base = select_entries(&reg, &["p9".into()], &[], false).unwrap();
        assert_eq!(by_base, vec![EntryId::new(1, 1, "p9")]);
    }

    #[test]
    fn test_select_case_insensitive_file_name() {
        let ids = select_entries(&registry(), &["cover.jpg".into()], &[], false).unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_select_unknown_page_fails() {
        let err = select_entries(&registry(), &["page2.tif".into()], &[], false).unwrap_err();
        assert!(matches!(err, G4TrackError::InvalidInput(_)));
    }

    #[test]
    fn test_select_by_pattern() {
        let reg = registry();
        let ids = select_entries(&reg, &[], &["page*".into()], false).unwrap();
        assert_eq!(ids, vec![EntryId::new(0, 1, "page1")]);
        assert!(select_entries(&reg, &[], &["[".into()], false).is_err());
    }

    #[test]
    fn test_nothing_selected() {
        assert!(select_entries(&registry(), &[], &[], false).unwrap().is_empty());
    }
}
