//! List command - show pages still waiting for conversion

use std::path::Path;

use colored::Colorize;

use crate::{G4TrackError, session::Session};

type Result<T> = std::result::Result<T, G4TrackError>;

/// Execute the list command
///
/// # Errors
///
/// Returns `G4TrackError` if the manifest cannot be loaded or JSON output fails.
pub fn execute(manifest_path: &Path, json: bool, quiet: bool) -> Result<()> {
    let session = Session::load(manifest_path)?;
    let registry = session.registry();

    if json {
        println!("{}", serde_json::to_string_pretty(registry.entries())?);
        return Ok(());
    }

    if quiet {
        for entry in registry {
            let page = session.manifest().page(entry.id.document, entry.id.row);
            if let Some(page) = page {
                println!("{}", page.path(session.base_dir()).display());
            }
        }
        return Ok(());
    }

    if registry.is_empty() {
        println!("No pages waiting for conversion.");
        return Ok(());
    }

    let mut current_doc = None;
    for entry in registry {
        if current_doc != Some(entry.id.document) {
            current_doc = Some(entry.id.document);
            println!("{}", entry.target.bold());
        }
        println!(
            "  {} {}",
            entry.file_name,
            format!("({},{})", entry.id.document, entry.id.row).dimmed()
        );
    }

    let manifest = session.manifest();
    println!(
        "\n{} pending page(s) of {} across {} document(s)",
        registry.len(),
        manifest.page_count(),
        manifest.documents().len()
    );
    Ok(())
}
