//! Queue ordering state
//!
//! Pure data structure behind the orchestrator: both play orders, the current
//! position, and the navigation rules. No I/O, no locking.

use core_library::models::TrackRef;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Repeat behavior when a track ends or the queue wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Stop at the end of the queue
    #[default]
    None,
    /// Wrap around to the first track
    All,
    /// Replay the current track
    One,
}

/// A track's slot in the queue.
///
/// `id` is unique within the queue so the same track queued twice stays
/// distinguishable across shuffles and removals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: u64,
    pub track: TrackRef,
}

/// What to do when the current track finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEndAction {
    /// Seek to zero and keep playing
    Restart,
    /// Load the track at this index of the active order
    Play(usize),
    /// End of queue
    Stop,
}

/// Play orders and position.
#[derive(Debug, Clone, Default)]
pub struct QueueState {
    original_order: Vec<QueueEntry>,
    shuffled_order: Vec<QueueEntry>,
    current_index: Option<usize>,
    repeat_mode: RepeatMode,
    shuffle_enabled: bool,
    next_entry_id: u64,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The order playback follows: shuffled when shuffle is on.
    pub fn active_order(&self) -> &[QueueEntry] {
        if self.shuffle_enabled {
            &self.shuffled_order
        } else {
            &self.original_order
        }
    }

    /// Insertion order.
    pub fn original_order(&self) -> &[QueueEntry] {
        &self.original_order
    }

    pub fn len(&self) -> usize {
        self.original_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original_order.is_empty()
    }

    /// Index into the active order; `None` only when empty.
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.current_index.and_then(|i| self.active_order().get(i))
    }

    pub fn entry_at(&self, index: usize) -> Option<&QueueEntry> {
        self.active_order().get(index)
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Replace the queue. `start` is an index into `tracks` and is clamped.
    ///
    /// With shuffle on, the queue is reshuffled with the start track pinned
    /// first.
    pub fn set_tracks<R: Rng + ?Sized>(&mut self, tracks: Vec<TrackRef>, start: usize, rng: &mut R) {
        let entries: Vec<QueueEntry> = tracks.into_iter().map(|t| self.make_entry(t)).collect();

        self.current_index = if entries.is_empty() {
            None
        } else {
            Some(start.min(entries.len() - 1))
        };
        self.shuffled_order = entries.clone();
        self.original_order = entries;

        if self.shuffle_enabled {
            self.shuffle_pinning_current(rng);
        }
    }

    /// Append a track to the end of both orders.
    pub fn push(&mut self, track: TrackRef) -> QueueEntry {
        let entry = self.make_entry(track);
        self.original_order.push(entry.clone());
        self.shuffled_order.push(entry.clone());
        if self.current_index.is_none() {
            self.current_index = Some(0);
        }
        entry
    }

    /// Remove the entry at `index` of the active order.
    ///
    /// Entries before the current one shift it down; removing the current
    /// entry leaves the position on its successor (or the new last entry).
    pub fn remove(&mut self, index: usize) -> Option<QueueEntry> {
        let removed = self.active_order().get(index)?.clone();

        self.original_order.retain(|e| e.id != removed.id);
        self.shuffled_order.retain(|e| e.id != removed.id);

        let len = self.len();
        self.current_index = match self.current_index {
            _ if len == 0 => None,
            Some(current) if index < current => Some(current - 1),
            Some(current) if index == current => Some(current.min(len - 1)),
            other => other,
        };

        Some(removed)
    }

    pub fn clear(&mut self) {
        self.original_order.clear();
        self.shuffled_order.clear();
        self.current_index = None;
    }

    /// Move the position. Fails when `index` is outside the active order.
    pub fn set_current(&mut self, index: usize) -> bool {
        if index >= self.len() {
            return false;
        }
        self.current_index = Some(index);
        true
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    /// Turn shuffle on or off. Returns `false` when nothing changed.
    ///
    /// Turning it on reshuffles with the current entry moved to the front;
    /// turning it off maps the position back into insertion order.
    pub fn set_shuffle<R: Rng + ?Sized>(&mut self, enabled: bool, rng: &mut R) -> bool {
        if enabled == self.shuffle_enabled {
            return false;
        }

        let current_id = self.current().map(|e| e.id);
        self.shuffle_enabled = enabled;

        if enabled {
            self.shuffled_order = self.original_order.clone();
            self.current_index = current_id.and_then(|id| position_of(&self.shuffled_order, id));
            self.shuffle_pinning_current(rng);
        } else {
            self.current_index = current_id.and_then(|id| position_of(&self.original_order, id));
        }

        true
    }

    fn shuffle_pinning_current<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let current_id = self
            .current_index
            .and_then(|i| self.shuffled_order.get(i))
            .map(|e| e.id);

        self.shuffled_order.shuffle(rng);

        if let Some(id) = current_id {
            if let Some(pos) = position_of(&self.shuffled_order, id) {
                let entry = self.shuffled_order.remove(pos);
                self.shuffled_order.insert(0, entry);
                self.current_index = Some(0);
            }
        }
    }

    fn make_entry(&mut self, track: TrackRef) -> QueueEntry {
        let id = self.next_entry_id;
        self.next_entry_id += 1;
        QueueEntry { id, track }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Index for a skip forward. Wraps, except under `RepeatMode::None`
    /// where wrapping means stop (`None`).
    pub fn next_index(&self) -> Option<usize> {
        let len = self.len();
        let current = self.current_index?;
        let next = (current + 1) % len;
        if next == 0 && self.repeat_mode == RepeatMode::None {
            return None;
        }
        Some(next)
    }

    /// Index for a skip back: one earlier, wrapping to the last entry only
    /// under `RepeatMode::All`, otherwise clamped at the first.
    pub fn previous_index(&self) -> Option<usize> {
        let current = self.current_index?;
        Some(match current.checked_sub(1) {
            Some(previous) => previous,
            None if self.repeat_mode == RepeatMode::All => self.len() - 1,
            None => 0,
        })
    }

    /// Policy for the end of the current track.
    pub fn track_end_action(&self) -> TrackEndAction {
        let current = match self.current_index {
            Some(current) => current,
            None => return TrackEndAction::Stop,
        };
        let last = self.len() - 1;

        match self.repeat_mode {
            RepeatMode::One => TrackEndAction::Restart,
            RepeatMode::All if current >= last => TrackEndAction::Play(0),
            RepeatMode::All => TrackEndAction::Play(current + 1),
            RepeatMode::None if current < last => TrackEndAction::Play(current + 1),
            RepeatMode::None => TrackEndAction::Stop,
        }
    }

    /// Track worth downloading ahead of time: the next entry, wrapping.
    ///
    /// `None` for single-entry queues and when the next entry is the track
    /// already playing.
    pub fn precache_candidate(&self) -> Option<&TrackRef> {
        let len = self.len();
        if len <= 1 {
            return None;
        }
        let current = self.current()?;
        let next = self.entry_at((self.current_index? + 1) % len)?;
        if next.track.remote_id == current.track.remote_id {
            return None;
        }
        Some(&next.track)
    }
}

fn position_of(order: &[QueueEntry], id: u64) -> Option<usize> {
    order.iter().position(|e| e.id == id)
}
