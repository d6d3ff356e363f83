// Wire messages for the stats stream. Every frame is a JSON object with a
// `type` discriminator and a backend timestamp alongside the payload fields.

use serde::{Deserialize, Serialize};

use crate::events::ActivityKind;
use crate::models::StatsSnapshot;

/// Messages pushed by the stats backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot sent right after the connection opens; replaces any
    /// previously held stats wholesale.
    Initial {
        #[serde(default)]
        timestamp: Option<i64>,
        stats: StatsSnapshot,
    },
    /// Full snapshot answering an explicit refresh request; same replace
    /// semantics as `Initial`.
    Refresh {
        #[serde(default)]
        timestamp: Option<i64>,
        stats: StatsSnapshot,
    },
    /// Partial snapshot on the server's own cadence; shallow-merged over the
    /// held stats.
    Periodic {
        #[serde(default)]
        timestamp: Option<i64>,
        stats: StatsSnapshot,
    },
    /// Live play event from some device, optionally carrying refreshed
    /// today-counters.
    PlayUpdate {
        #[serde(default)]
        timestamp: Option<i64>,
        event_type: ActivityKind,
        track_id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        artist: Option<String>,
        #[serde(default)]
        stats: Option<StatsSnapshot>,
    },
    /// Keep-alive reply; carries no payload beyond liveness.
    Pong {
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

impl ServerMessage {
    // Short name for log lines
    pub fn message_type(&self) -> &'static str {
        match self {
            ServerMessage::Initial { .. } => "initial",
            ServerMessage::Refresh { .. } => "refresh",
            ServerMessage::Periodic { .. } => "periodic",
            ServerMessage::PlayUpdate { .. } => "play_update",
            ServerMessage::Pong { .. } => "pong",
        }
    }
}

/// The only two frames this client ever sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    Refresh,
}

impl ClientMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            ClientMessage::Ping => "ping",
            ClientMessage::Refresh => "refresh",
        }
    }
}
