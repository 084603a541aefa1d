//! Replacing stubs in a track listing with hydrated tracks.
//!
//! The listing is walked from the front. Hydrated entries are kept until the
//! first stub; from there on every entry's id is queued, hydrated or not, and
//! looked up in batches of [`RESOLVE_THRESHOLD`]. A hydrated entry that
//! follows a stub is therefore fetched again rather than reused.
//!
//! Planning and assembly are separate from the lookups so that the async and
//! the blocking client share them and only differ in how batches are run.

use crate::Track;
use crate::TrackEntry;

/// Number of stub ids collected before a batch lookup is issued.
pub const RESOLVE_THRESHOLD: usize = 100;

#[derive(Debug, Default)]
pub(crate) struct ReconcilePlan {
    leading: Vec<Track>,
    batches: Vec<Vec<u64>>,
}

impl ReconcilePlan {
    pub(crate) fn new(entries: Vec<TrackEntry>) -> Self {
        let mut entries = entries.into_iter().peekable();

        let mut leading = Vec::new();
        while let Some(TrackEntry::Full(_)) = entries.peek() {
            if let Some(TrackEntry::Full(track)) = entries.next() {
                leading.push(*track);
            }
        }

        let mut batches = Vec::new();
        let mut pending = Vec::new();
        for entry in entries {
            pending.push(entry.id());
            if pending.len() == RESOLVE_THRESHOLD {
                batches.push(std::mem::take(&mut pending));
            }
        }
        if !pending.is_empty() {
            batches.push(pending);
        }

        Self { leading, batches }
    }

    /// Id batches that have to be looked up, in listing order.
    pub(crate) fn batches(&self) -> &[Vec<u64>] {
        &self.batches
    }

    /// Build the reconciled listing from one lookup result per batch.
    pub(crate) fn assemble<I>(self, resolved: I) -> Vec<TrackEntry>
    where
        I: IntoIterator<Item = Vec<Track>>,
    {
        self.leading
            .into_iter()
            .chain(resolved.into_iter().flatten())
            .map(TrackEntry::from)
            .collect()
    }
}
