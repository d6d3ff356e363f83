use serde::{Deserialize, Serialize};

// Track as supplied by the library catalog, immutable from the engine's side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    // Whole seconds; 0 means the catalog did not report a duration
    #[serde(default)]
    pub duration_secs: u32,
}

impl Track {
    /// Returns true if the catalog reported a usable duration.
    pub fn has_known_duration(&self) -> bool {
        self.duration_secs > 0
    }
}

/// Repeat behaviour applied when a track finishes or navigation hits a
/// queue boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Stop at the end of the queue.
    #[default]
    Off,
    /// Wrap around to the start of the queue.
    All,
    /// Replay the current track once, then fall back to `Off`.
    Once,
}

impl RepeatMode {
    /// Next mode in the toggle cycle: Off -> All -> Once -> Off.
    pub fn cycled(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::Once,
            RepeatMode::Once => RepeatMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::Once => "once",
        }
    }
}

// Aggregate listening counters pushed by the stats backend. Every field is
// optional so partial payloads can be merged over an existing snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_plays: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_songs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_artists: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_streak_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longest_streak_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plays_today: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_today: Option<u64>,
}

impl StatsSnapshot {
    /// Shallow-merge `other` into `self`: fields present in `other` replace
    /// ours, absent fields keep their previous value. Returns true if any
    /// field actually changed.
    pub fn merge_from(&mut self, other: &StatsSnapshot) -> bool {
        let mut updated = false;

        if let Some(v) = other.total_plays {
            if self.total_plays != Some(v) {
                self.total_plays = Some(v);
                updated = true;
            }
        }

        if let Some(v) = other.unique_songs {
            if self.unique_songs != Some(v) {
                self.unique_songs = Some(v);
                updated = true;
            }
        }

        if let Some(v) = other.unique_artists {
            if self.unique_artists != Some(v) {
                self.unique_artists = Some(v);
                updated = true;
            }
        }

        if let Some(v) = other.current_streak_days {
            if self.current_streak_days != Some(v) {
                self.current_streak_days = Some(v);
                updated = true;
            }
        }

        if let Some(v) = other.longest_streak_days {
            if self.longest_streak_days != Some(v) {
                self.longest_streak_days = Some(v);
                updated = true;
            }
        }

        if let Some(v) = other.completion_rate {
            if self.completion_rate != Some(v) {
                self.completion_rate = Some(v);
                updated = true;
            }
        }

        if let Some(v) = other.plays_today {
            if self.plays_today != Some(v) {
                self.plays_today = Some(v);
                updated = true;
            }
        }

        if let Some(v) = other.minutes_today {
            if self.minutes_today != Some(v) {
                self.minutes_today = Some(v);
                updated = true;
            }
        }

        updated
    }
}
