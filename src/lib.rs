mod codec;
pub use codec::{FrameCodec, MAX_FRAME_BYTES};
mod error;
pub use error::TonearmError;
mod events;
pub use events::{ActivityItem, ActivityKind, StreamEvent};
mod models;
pub use models::{RepeatMode, StatsSnapshot, Track};
mod player;
pub use player::{PlayState, Player, PlayerSnapshot, PREVIOUS_RESTART_THRESHOLD_SECS};
mod protocol;
pub use protocol::{ClientMessage, ServerMessage};
mod queue;
pub use queue::PlayQueue;
mod reporter;
pub use reporter::PlayReporter;
mod service;
pub use service::{PlayerCommand, PlayerHandle};
mod settings;
pub use settings::{ReporterConfig, StreamConfig};
mod state;
pub use state::ConnectionState;
mod stream;
pub use stream::StatsStreamClient;
mod tracker;
pub use tracker::{PlayEvent, PlayEventKind, PlayTracker};
