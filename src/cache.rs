use std::collections::HashMap;

use crate::track::TrackId;

/// Last known saved flag per track, for the lifetime of the page.
///
/// Entries only come from successful lookups or mutations. There is no
/// expiry; [`SavedStateCache::clear`] is driven by the refresh signal.
#[derive(Debug, Default)]
pub struct SavedStateCache {
    entries: HashMap<TrackId, bool>,
}

impl SavedStateCache {
    pub fn get(&self, id: &TrackId) -> Option<bool> {
        self.entries.get(id).copied()
    }

    pub fn insert(&mut self, id: TrackId, saved: bool) {
        self.entries.insert(id, saved);
    }

    /// Stores parallel slices as returned by a batch lookup.
    pub fn set_many(&mut self, ids: &[TrackId], values: &[bool]) {
        debug_assert_eq!(ids.len(), values.len());
        for (id, saved) in ids.iter().zip(values) {
            self.entries.insert(id.clone(), *saved);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
