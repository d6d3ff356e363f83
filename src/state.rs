use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::events::ActivityItem;
use crate::models::StatsSnapshot;

/// Where the stream connection currently stands. Published on a watch
/// channel; the richer internal variants all read as "not connected"
/// through [`ConnectionState::is_connected`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Sleeping out a backoff delay before reconnect `attempt`.
    WaitingToReconnect { backoff: Duration, attempt: u32 },
    Stopping,
    /// Reconnect budget exhausted; stays until an explicit re-enable.
    Failed(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// True once the client has given up; only `connect()` clears this.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed(_))
    }

    // Short name for log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::WaitingToReconnect { .. } => "waiting_to_reconnect",
            ConnectionState::Stopping => "stopping",
            ConnectionState::Failed(_) => "failed",
        }
    }
}

// Shared view of what the backend has pushed so far. Written only by the
// manager task, read through the client's accessors.
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    pub(crate) stats: StatsSnapshot,
    pub(crate) activity: VecDeque<ActivityItem>,
    pub(crate) last_update: Option<Instant>,
    pub(crate) error: Option<String>,
}

impl StreamState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_update(&mut self) {
        self.last_update = Some(Instant::now());
    }

    // Newest first, bounded
    pub(crate) fn push_activity(&mut self, item: ActivityItem, cap: usize) {
        self.activity.push_front(item);
        self.activity.truncate(cap);
    }
}
