use std::collections::VecDeque;

use crate::models::Track;

/// Two-tier play queue: an explicit "up next" line that is always consumed
/// first, over a context list (album, playlist, library view) that playback
/// walks through once the explicit line is empty.
///
/// The context list is never reordered in place; shuffle and repeat decide
/// *which index plays next*, not how the list is stored.
#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    context: Vec<Track>,
    current_index: Option<usize>,
    up_next: VecDeque<Track>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the context list and resolve the index of `current_id` within
    /// it. An id that does not occur leaves the position unresolved.
    pub fn replace_context(&mut self, tracks: Vec<Track>, current_id: &str) {
        self.context = tracks;
        self.current_index = self.position_of(current_id);
    }

    /// First occurrence of a track id in the context list.
    pub fn position_of(&self, track_id: &str) -> Option<usize> {
        self.context.iter().position(|t| t.id == track_id)
    }

    pub fn context(&self) -> &[Track] {
        &self.context
    }

    pub fn context_len(&self) -> usize {
        self.context.len()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Point at a context position. Passing an out-of-range index clears the
    /// position instead of storing a lie.
    pub fn set_current_index(&mut self, index: Option<usize>) {
        self.current_index = index.filter(|i| *i < self.context.len());
    }

    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.context.get(index)
    }

    // ---------- explicit up-next line ----------

    pub fn push_up_next(&mut self, track: Track) {
        self.up_next.push_back(track);
    }

    /// Remove one queued entry; out-of-range is a no-op.
    pub fn remove_up_next(&mut self, index: usize) -> Option<Track> {
        if index >= self.up_next.len() {
            return None;
        }
        self.up_next.remove(index)
    }

    /// Take the head of the up-next line, if any.
    pub fn pop_up_next(&mut self) -> Option<Track> {
        self.up_next.pop_front()
    }

    /// Skip-ahead promote: returns entry `index` for immediate playback and
    /// drops everything queued ahead of it. Entries after `index` keep their
    /// order. Out-of-range returns None and changes nothing.
    pub fn promote_up_next(&mut self, index: usize) -> Option<Track> {
        if index >= self.up_next.len() {
            return None;
        }
        self.up_next.drain(..=index).last()
    }

    pub fn clear_up_next(&mut self) {
        self.up_next.clear();
    }

    pub fn up_next(&self) -> impl Iterator<Item = &Track> {
        self.up_next.iter()
    }

    pub fn up_next_len(&self) -> usize {
        self.up_next.len()
    }

    pub fn has_up_next(&self) -> bool {
        !self.up_next.is_empty()
    }
}
