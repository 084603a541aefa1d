//! Splitting batched track lookups and putting the answers back in order.
//!
//! Both clients fan the chunks out concurrently, so responses complete in no
//! particular order, and the API does not keep the order of `ids` within a
//! chunk either. Everything here is independent of how the requests run.

use crate::Track;
use std::collections::HashMap;

/// Maximum number of ids the tracks endpoint accepts per request.
pub const TRACK_BATCH_SIZE: usize = 50;

/// Split `track_ids` into request-sized chunks.
pub(crate) fn chunks(track_ids: &[u64]) -> std::slice::Chunks<'_, u64> {
    track_ids.chunks(TRACK_BATCH_SIZE)
}

/// Arrange `tracks` in the order of `track_ids`.
pub(crate) fn restore_order<I>(track_ids: &[u64], tracks: I) -> Vec<Track>
where
    I: IntoIterator<Item = Track>,
{
    let mut by_id: HashMap<u64, Track> = tracks.into_iter().map(|t| (t.id, t)).collect();
    let last_position: HashMap<u64, usize> = track_ids
        .iter()
        .enumerate()
        .map(|(position, &id)| (id, position))
        .collect();

    let mut ordered = Vec::with_capacity(track_ids.len());
    for (position, id) in track_ids.iter().enumerate() {
        // Clone for every occurrence but the last, which takes ownership
        let track = if last_position.get(id) != Some(&position) {
            by_id.get(id).cloned()
        } else {
            by_id.remove(id)
        };

        match track {
            Some(track) => ordered.push(track),
            None => log::warn!("Track {} was not returned by SoundCloud", id),
        }
    }

    ordered
}
