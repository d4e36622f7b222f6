//! Tick and active-page state
//!
//! Selection is purely in-memory and always checked against the current
//! [`Registry`] snapshot. Identities that are not in the snapshot (for example
//! a page converted by the last batch) are ignored without error.

use std::collections::BTreeSet;

use tracing::trace;

use crate::registry::{EntryId, Registry};

/// Ticked entries plus at most one active (viewed) entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ticked: BTreeSet<EntryId>,
    active: Option<EntryId>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` for conversion. Returns `true` if the tick set changed.
    pub fn tick(&mut self, registry: &Registry, id: &EntryId) -> bool {
        if !registry.contains(id) {
            trace!(%id, "ignoring tick of stale entry");
            return false;
        }
        self.ticked.insert(id.clone())
    }

    /// Remove the tick from `id`. Returns `true` if the tick set changed.
    pub fn untick(&mut self, registry: &Registry, id: &EntryId) -> bool {
        if !registry.contains(id) {
            trace!(%id, "ignoring untick of stale entry");
            return false;
        }
        self.ticked.remove(id)
    }

    /// Flip the tick state of `id`. Returns the new state, or `None` when the
    /// entry is stale.
    pub fn toggle(&mut self, registry: &Registry, id: &EntryId) -> Option<bool> {
        if !registry.contains(id) {
            return None;
        }
        if self.ticked.remove(id) {
            Some(false)
        } else {
            self.ticked.insert(id.clone());
            Some(true)
        }
    }

    /// Make `id` the viewed entry. No-op if it is stale.
    pub fn set_active(&mut self, registry: &Registry, id: &EntryId) {
        if registry.contains(id) {
            self.active = Some(id.clone());
        } else {
            trace!(%id, "ignoring activation of stale entry");
        }
    }

    /// Forget all ticks and the active entry. Run on every registry rebuild.
    pub fn clear_all(&mut self) {
        self.ticked.clear();
        self.active = None;
    }

    #[must_use]
    pub fn is_ticked(&self, id: &EntryId) -> bool {
        self.ticked.contains(id)
    }

    #[must_use]
    pub const fn active(&self) -> Option<&EntryId> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn ticked_count(&self) -> usize {
        self.ticked.len()
    }

    /// Ticked entries that exist in `registry`, in display order
    #[must_use]
    pub fn ticked_in(&self, registry: &Registry) -> Vec<EntryId> {
        registry
            .iter()
            .filter(|e| self.ticked.contains(&e.id))
            .map(|e| e.id.clone())
            .collect()
    }
}
