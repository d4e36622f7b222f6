//! Pending-page registry
//!
//! The registry is a read-only projection of a [`Manifest`]: every page that
//! is still a JPG, in document order and then row order. It is rebuilt from
//! the manifest after every load and every successful save, never patched in
//! place, so it can never disagree with the manifest it was built from.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::manifest::Manifest;

/// Identity of a registry entry: (document index, row index, base name).
///
/// `row` is the page's position inside its document row, counting every page
/// field including converted ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntryId {
    pub document: usize,
    pub row: usize,
    pub name: String,
}

impl EntryId {
    #[must_use]
    pub fn new(document: usize, row: usize, name: impl Into<String>) -> Self {
        Self {
            document,
            row,
            name: name.into(),
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@({},{})", self.name, self.document, self.row)
    }
}

/// A pending page as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub id: EntryId,
    /// File name with extension, e.g. `page1.jpg`
    pub file_name: String,
    /// Target name of the owning document
    pub target: String,
}

impl fmt::Display for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@({},{})",
            self.file_name, self.id.document, self.id.row
        )
    }
}

/// Ordered snapshot of pending pages
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    index: HashMap<EntryId, usize>,
}

impl Registry {
    /// Build the registry from a manifest.
    ///
    /// Includes exactly the pages whose extension is `jpg`.
    #[must_use]
    pub fn build(manifest: &Manifest) -> Self {
        let entries: Vec<RegistryEntry> = manifest
            .documents()
            .iter()
            .enumerate()
            .flat_map(|(d, doc)| {
                doc.pages()
                    .iter()
                    .enumerate()
                    .filter(|(_, page)| page.is_pending())
                    .map(move |(r, page)| RegistryEntry {
                        id: EntryId::new(d, r, page.name()),
                        file_name: page.file_name(),
                        target: doc.target().to_string(),
                    })
            })
            .collect();

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();

        debug!(entries = entries.len(), "built registry");
        Self { entries, index }
    }

    /// Entries in display order
    #[must_use]
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegistryEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if `id` is part of this snapshot
    #[must_use]
    pub fn contains(&self, id: &EntryId) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &EntryId) -> Option<&RegistryEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// Display position of `id`
    #[must_use]
    pub fn position(&self, id: &EntryId) -> Option<usize> {
        self.index.get(id).copied()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a RegistryEntry;
    type IntoIter = std::slice::Iter<'a, RegistryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
