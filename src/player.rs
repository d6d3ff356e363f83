use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::{RepeatMode, Track};
use crate::queue::PlayQueue;
use crate::tracker::{PlayEvent, PlayEventKind, PlayTracker};

/// Elapsed playback (seconds) past which a backward navigation restarts the
/// current track instead of stepping to the previous one.
pub const PREVIOUS_RESTART_THRESHOLD_SECS: u32 = 3;

/// What the player is doing right now. Loaded-and-playing with no track is
/// unrepresentable by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayState {
    /// Nothing has been loaded yet.
    Idle,
    /// A track is loaded but the clock is stopped.
    Paused { track: Track },
    /// A track is loaded and advancing.
    Playing { track: Track },
}

impl PlayState {
    pub fn track(&self) -> Option<&Track> {
        match self {
            PlayState::Idle => None,
            PlayState::Paused { track } | PlayState::Playing { track } => Some(track),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlayState::Playing { .. })
    }
}

// Everything a UI needs to render the transport and queue views
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub position_secs: u32,
    pub context: Vec<Track>,
    pub current_index: Option<usize>,
    pub up_next: Vec<Track>,
    pub repeat_mode: RepeatMode,
    pub shuffle_enabled: bool,
    pub playback_version: u64,
}

// Outcome of picking the next context position
enum NextIndex {
    Play(usize),
    Boundary,
    NoContext,
}

/// The playback session state machine.
///
/// Every operation is a total, in-memory transition: invalid indices and
/// empty-queue navigation are silent no-ops, never errors. Lifecycle
/// telemetry is handed to a [`PlayTracker`] on each transition; emission is
/// fire-and-forget and can never stall or fail playback.
#[derive(Debug)]
pub struct Player {
    state: PlayState,
    queue: PlayQueue,
    repeat: RepeatMode,
    shuffle: bool,
    version: u64,
    position_secs: u32,
    tracker: PlayTracker,
}

impl Player {
    pub fn new(events: mpsc::UnboundedSender<PlayEvent>) -> Self {
        Self {
            state: PlayState::Idle,
            queue: PlayQueue::new(),
            repeat: RepeatMode::Off,
            shuffle: false,
            version: 0,
            position_secs: 0,
            tracker: PlayTracker::new(events),
        }
    }

    // ---------- accessors ----------

    pub fn state(&self) -> &PlayState {
        &self.state
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.state.track()
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn queue(&self) -> &PlayQueue {
        &self.queue
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    /// Monotonic counter bumped once per playback run. Play/pause toggles
    /// never touch it.
    pub fn playback_version(&self) -> u64 {
        self.version
    }

    pub fn position_secs(&self) -> u32 {
        self.position_secs
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            current_track: self.state.track().cloned(),
            is_playing: self.state.is_playing(),
            position_secs: self.position_secs,
            context: self.queue.context().to_vec(),
            current_index: self.queue.current_index(),
            up_next: self.queue.up_next().cloned().collect(),
            repeat_mode: self.repeat,
            shuffle_enabled: self.shuffle,
            playback_version: self.version,
        }
    }

    // ---------- operations ----------

    /// Play `track` immediately. When `context` is given it replaces the
    /// context list and the position is re-resolved by track id (an id that
    /// does not occur leaves the position unresolved). Without a context the
    /// previous list and position are left untouched.
    pub fn play_song(&mut self, track: Track, context: Option<Vec<Track>>) {
        if let Some(list) = context {
            self.queue.replace_context(list, &track.id);
        }
        self.start_run(track);
    }

    /// Flip between playing and paused. A no-op until a track is loaded.
    pub fn toggle_play_pause(&mut self) {
        match &self.state {
            PlayState::Idle => {}
            PlayState::Playing { track } => {
                let track = track.clone();
                self.tracker
                    .record(&track, PlayEventKind::Pause, self.position_secs);
                self.state = PlayState::Paused { track };
            }
            PlayState::Paused { track } => {
                let track = track.clone();
                self.tracker
                    .record(&track, PlayEventKind::Resume, self.position_secs);
                self.state = PlayState::Playing { track };
            }
        }
    }

    /// Append to the explicit up-next line.
    pub fn add_to_queue(&mut self, track: Track) {
        debug!(track_id = %track.id, "queued track");
        self.queue.push_up_next(track);
    }

    /// Remove one up-next entry; out-of-range is a no-op.
    pub fn remove_from_queue(&mut self, index: usize) {
        self.queue.remove_up_next(index);
    }

    /// Play up-next entry `index` right now, skipping everything queued
    /// ahead of it. Out-of-range is a no-op.
    pub fn play_from_queue(&mut self, index: usize) {
        if let Some(track) = self.queue.promote_up_next(index) {
            self.start_run(track);
        }
    }

    /// Drop the whole up-next line. The context list is untouched.
    pub fn clear_queue(&mut self) {
        self.queue.clear_up_next();
    }

    /// Flip shuffle. Selection-time randomness only: the context list keeps
    /// its stored order, so toggling twice changes nothing.
    pub fn toggle_shuffle(&mut self) {
        self.shuffle = !self.shuffle;
        debug!(enabled = self.shuffle, "shuffle toggled");
    }

    /// Cycle repeat: Off -> All -> Once -> Off.
    pub fn toggle_repeat(&mut self) {
        self.repeat = self.repeat.cycled();
        debug!(mode = self.repeat.as_str(), "repeat toggled");
    }

    /// Manual skip forward. The up-next line always wins; otherwise advance
    /// within the context list. Hitting the end with repeat off stops
    /// playback without emitting telemetry (superseding a run mid-flight is
    /// not a completion).
    pub fn play_next(&mut self) {
        if let Some(track) = self.queue.pop_up_next() {
            self.start_run(track);
            return;
        }
        match self.next_context_index() {
            NextIndex::Play(i) => self.start_at_index(i),
            NextIndex::Boundary => match self.repeat {
                RepeatMode::All => self.start_at_index(0),
                RepeatMode::Off | RepeatMode::Once => self.stop_silently(),
            },
            NextIndex::NoContext => {}
        }
    }

    /// Manual step backward through the context list. Ignores the up-next
    /// line and shuffle; wraps only on repeat-all. More than
    /// [`PREVIOUS_RESTART_THRESHOLD_SECS`] into a track it restarts the
    /// current run from zero instead.
    pub fn play_previous(&mut self) {
        let Some(current) = self.state.track().cloned() else {
            return;
        };

        if self.position_secs >= PREVIOUS_RESTART_THRESHOLD_SECS {
            self.position_secs = 0;
            self.tracker.record(&current, PlayEventKind::Seek, 0);
            return;
        }

        if self.queue.context_len() == 0 {
            return;
        }
        match self.queue.current_index() {
            Some(i) if i > 0 => self.start_at_index(i - 1),
            // At (or before) the first entry
            _ => match self.repeat {
                RepeatMode::All => self.start_at_index(self.queue.context_len() - 1),
                RepeatMode::Off | RepeatMode::Once => self.stop_silently(),
            },
        }
    }

    /// Seek within the current track; clamped to its duration. A no-op until
    /// a track is loaded. Does not change play/pause.
    pub fn seek_to(&mut self, position_secs: u32) {
        let Some(track) = self.state.track().cloned() else {
            return;
        };
        let clamped = if track.has_known_duration() {
            position_secs.min(track.duration_secs)
        } else {
            position_secs
        };
        self.position_secs = clamped;
        self.tracker.record(&track, PlayEventKind::Seek, clamped);
    }

    /// The current track finished on its own. Emits `complete`, then either
    /// replays (repeat-once, which self-clears), advances like a skip, or
    /// closes the run with `end` when nothing follows.
    pub fn handle_song_end(&mut self) {
        let Some(track) = self.state.track().cloned() else {
            return;
        };
        self.tracker
            .record(&track, PlayEventKind::Complete, self.position_secs);

        if self.repeat == RepeatMode::Once {
            self.repeat = RepeatMode::Off;
            self.start_run(track);
            return;
        }

        if let Some(next) = self.queue.pop_up_next() {
            self.start_run(next);
            return;
        }
        match self.next_context_index() {
            NextIndex::Play(i) => self.start_at_index(i),
            NextIndex::Boundary if self.repeat == RepeatMode::All => self.start_at_index(0),
            NextIndex::Boundary | NextIndex::NoContext => self.end_run(track),
        }
    }

    /// One second of playback elapsed. Only meaningful while playing; fires
    /// the natural song end when the clock reaches the track duration.
    pub fn tick(&mut self) {
        let PlayState::Playing { track } = &self.state else {
            return;
        };
        let track = track.clone();
        self.position_secs = self.position_secs.saturating_add(1);
        if track.has_known_duration() && self.position_secs >= track.duration_secs {
            self.handle_song_end();
        }
    }

    // ---------- internals ----------

    // The single place a playback run starts: resets the clock, bumps the
    // version, opens a fresh telemetry session
    fn start_run(&mut self, track: Track) {
        self.position_secs = 0;
        self.version += 1;
        debug!(track_id = %track.id, version = self.version, "starting playback run");
        self.tracker.begin_run(&track);
        self.state = PlayState::Playing { track };
    }

    fn start_at_index(&mut self, index: usize) {
        let Some(track) = self.queue.track_at(index).cloned() else {
            return;
        };
        self.queue.set_current_index(Some(index));
        self.start_run(track);
    }

    // Natural dead end: the run closes with `end` and the clock resets
    fn end_run(&mut self, track: Track) {
        self.tracker
            .record(&track, PlayEventKind::End, self.position_secs);
        debug!(track_id = %track.id, "playback run ended, nothing follows");
        self.position_secs = 0;
        self.state = PlayState::Paused { track };
    }

    // Manual boundary stop: keep the track and clock, drop out of playing,
    // say nothing to telemetry
    fn stop_silently(&mut self) {
        if let PlayState::Playing { track } = &self.state {
            debug!(track_id = %track.id, "stopped at queue boundary");
            self.state = PlayState::Paused {
                track: track.clone(),
            };
        }
    }

    fn next_context_index(&self) -> NextIndex {
        let len = self.queue.context_len();
        if len == 0 {
            return NextIndex::NoContext;
        }
        if self.shuffle {
            return NextIndex::Play(self.shuffle_index(len));
        }
        let next = self.queue.current_index().map_or(0, |i| i + 1);
        if next < len {
            NextIndex::Play(next)
        } else {
            NextIndex::Boundary
        }
    }

    // In-range random pick that avoids replaying the current position when
    // there is any alternative. PlayQueue keeps the stored index in range.
    fn shuffle_index(&self, len: usize) -> usize {
        let mut rng = rand::rng();
        match self.queue.current_index() {
            Some(current) if len > 1 => {
                let pick = rng.random_range(0..len - 1);
                if pick >= current {
                    pick + 1
                } else {
                    pick
                }
            }
            _ => rng.random_range(0..len),
        }
    }
}
