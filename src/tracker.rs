use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::Track;

/// Lifecycle stages of a playback run, in the order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayEventKind {
    Start,
    Pause,
    Resume,
    Seek,
    Complete,
    End,
}

impl PlayEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayEventKind::Start => "start",
            PlayEventKind::Pause => "pause",
            PlayEventKind::Resume => "resume",
            PlayEventKind::Seek => "seek",
            PlayEventKind::Complete => "complete",
            PlayEventKind::End => "end",
        }
    }
}

// One telemetry record, shaped the way the reporting endpoint expects it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayEvent {
    pub track_id: String,
    pub session_id: String,
    pub kind: PlayEventKind,
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_ms: Option<u64>,
}

/// Stamps playback transitions with a per-run session id and hands them to
/// the reporting channel. Sends never block and a closed channel is ignored;
/// playback must not care whether anyone is listening.
#[derive(Debug)]
pub struct PlayTracker {
    events: mpsc::UnboundedSender<PlayEvent>,
    session_id: Option<String>,
}

impl PlayTracker {
    pub fn new(events: mpsc::UnboundedSender<PlayEvent>) -> Self {
        Self {
            events,
            session_id: None,
        }
    }

    /// The id of the run currently in flight, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Open a fresh run for `track`: mints a new session id and emits the
    /// `start` event. Any previous run is implicitly over.
    pub fn begin_run(&mut self, track: &Track) {
        self.session_id = Some(Uuid::new_v4().to_string());
        self.record(track, PlayEventKind::Start, 0);
    }

    /// Emit one lifecycle event for the run in flight.
    pub fn record(&mut self, track: &Track, kind: PlayEventKind, position_secs: u32) {
        let session_id = match &self.session_id {
            Some(id) => id.clone(),
            // A record before any run was opened; mint an id so the event
            // is still attributable
            None => {
                let id = Uuid::new_v4().to_string();
                self.session_id = Some(id.clone());
                id
            }
        };

        let event = PlayEvent {
            track_id: track.id.clone(),
            session_id,
            kind,
            timestamp_ms: now_ms(),
            position_ms: Some(u64::from(position_secs) * 1000),
        };

        // Fire and forget; a dropped receiver must never stall playback
        let _ = self.events.send(event);
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
