//! Verify command - check manifest pages against the files on disk

use std::path::Path;

use colored::Colorize;

use crate::{
    G4TrackError,
    config::G4TrackConfig,
    convert::CommandCodec,
    manifest::Manifest,
    output::{StdoutWriter, colorize_path},
    verify::{self, PageRef},
};

type Result<T> = std::result::Result<T, G4TrackError>;

/// Execute the verify command
///
/// # Errors
///
/// Returns `G4TrackError` if the manifest cannot be loaded, or
/// `G4TrackError::Incomplete` if missing files remain after the run.
pub fn execute(manifest_path: &Path, repair: bool, config: &G4TrackConfig, quiet: bool) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let base_dir = match manifest_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let report = verify::audit(&manifest, base_dir);
    if report.is_clean() {
        if !quiet {
            println!(
                "{} All {} page file(s) present.",
                "✓".green(),
                manifest.page_count()
            );
        }
        return Ok(());
    }

    print_section("Missing TIFFs (JPG still present)", &report.repairable, quiet);
    print_section("Missing TIFFs (no JPG to convert from)", &report.unrecoverable, quiet);
    print_section("Missing JPGs", &report.missing_jpgs, quiet);

    let mut remaining = report.problem_count();
    if repair && !report.repairable.is_empty() {
        let codec = CommandCodec::new(config.codec_command.clone());
        let output = StdoutWriter::new(quiet);
        let repaired = verify::repair(&report, &codec, &output);
        remaining -= repaired;
        if !quiet {
            println!("\nRe-created {repaired} of {} missing TIFF(s).", report.repairable.len());
        }
    }

    if remaining == 0 {
        Ok(())
    } else {
        Err(G4TrackError::Incomplete(format!(
            "{remaining} page file(s) missing"
        )))
    }
}

fn print_section(title: &str, pages: &[PageRef], quiet: bool) {
    if pages.is_empty() {
        return;
    }
    if quiet {
        for page in pages {
            println!("{}", page.path.display());
        }
        return;
    }
    println!("\n{} ({})", title.bold(), pages.len());
    for page in pages {
        println!(
            "  {} [{} ({},{})]",
            colorize_path(&page.path),
            page.target,
            page.document,
            page.row
        );
    }
}
