use serde::{Deserialize, Serialize};

use crate::models::StatsSnapshot;

/// What a listener did, as reported by the stats backend on the live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Started,
    Completed,
    Skipped,
    Paused,
    Resumed,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Started => "started",
            ActivityKind::Completed => "completed",
            ActivityKind::Skipped => "skipped",
            ActivityKind::Paused => "paused",
            ActivityKind::Resumed => "resumed",
        }
    }
}

// One entry of the rolling activity feed, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub kind: ActivityKind,
    pub track_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    // Milliseconds since the Unix epoch, as stamped by the backend
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl ActivityItem {
    /// Display label for the feed, falling back to the track id when the
    /// backend omitted the title.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.track_id)
    }
}

// Notifications broadcast by the stream client so consumers can react
// without polling the shared state
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The whole snapshot was replaced by an `initial`/`refresh` message.
    StatsReplaced(StatsSnapshot),
    /// A partial snapshot was merged in; carries the merged result.
    StatsMerged(StatsSnapshot),
    /// A live play event arrived and was prepended to the activity feed.
    Activity(ActivityItem),
}

impl StreamEvent {
    // Short name for log lines
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::StatsReplaced(_) => "stats_replaced",
            StreamEvent::StatsMerged(_) => "stats_merged",
            StreamEvent::Activity(_) => "activity",
        }
    }
}
