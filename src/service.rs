use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, Notify};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::error::TonearmError;
use crate::models::Track;
use crate::player::{Player, PlayerSnapshot};
use crate::tracker::PlayEvent;

/// Cadence of the playback clock while a track is playing.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

// Player commands
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    Play {
        track: Track,
        context: Option<Vec<Track>>,
    },
    TogglePlayPause,
    Next,
    Previous,
    SeekTo {
        position_secs: u32,
    },
    AddToQueue {
        track: Track,
    },
    RemoveFromQueue {
        index: usize,
    },
    PlayFromQueue {
        index: usize,
    },
    ClearQueue,
    ToggleShuffle,
    ToggleRepeat,
    /// The audio backend reported the current track finished on its own.
    SongEnded,
}

impl PlayerCommand {
    // Command name for log lines
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCommand::Play { .. } => "play",
            PlayerCommand::TogglePlayPause => "togglePlayPause",
            PlayerCommand::Next => "next",
            PlayerCommand::Previous => "previous",
            PlayerCommand::SeekTo { .. } => "seekTo",
            PlayerCommand::AddToQueue { .. } => "addToQueue",
            PlayerCommand::RemoveFromQueue { .. } => "removeFromQueue",
            PlayerCommand::PlayFromQueue { .. } => "playFromQueue",
            PlayerCommand::ClearQueue => "clearQueue",
            PlayerCommand::ToggleShuffle => "toggleShuffle",
            PlayerCommand::ToggleRepeat => "toggleRepeat",
            PlayerCommand::SongEnded => "songEnded",
        }
    }
}

/// Handle to the playback service task.
///
/// The task owns the [`Player`] and its once-per-second clock. Commands and
/// clock ticks are applied strictly one at a time, so every observer sees
/// each transition completed in full; after every applied change the task
/// publishes a [`PlayerSnapshot`] on a watch channel.
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<PlayerCommand>,
    snapshot_rx: watch::Receiver<PlayerSnapshot>,
    // Flag to signal the service task to stop
    stop_signal: Arc<AtomicBool>,
    // Shutdown notifier for the service task
    shutdown_notify: Arc<Notify>,
    task: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PlayerHandle {
    /// Start the playback service. Lifecycle telemetry flows into `events`.
    pub fn spawn(events: mpsc::UnboundedSender<PlayEvent>) -> Self {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<PlayerCommand>();
        let mut player = Player::new(events);
        let (snapshot_tx, snapshot_rx) = watch::channel(player.snapshot());
        let stop_signal = Arc::new(AtomicBool::new(false));
        let shutdown_notify = Arc::new(Notify::new());

        let stop = stop_signal.clone();
        let notify = shutdown_notify.clone();

        let handle = tokio::spawn(async move {
            info!("Player service task started");
            let mut clock = interval(TICK_INTERVAL);
            // A stalled loop must not fast-forward the position to catch up
            clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                if stop.load(Ordering::Relaxed) {
                    break;
                }

                tokio::select! {
                    biased;

                    _ = notify.notified() => {
                        debug!("Player service received shutdown notification");
                        break;
                    }

                    maybe_cmd = cmd_rx.recv() => {
                        // None means every handle is gone
                        let Some(command) = maybe_cmd else {
                            break;
                        };
                        trace!(command = command.name(), "Applying player command");
                        apply(&mut player, command);
                        publish(&player, &snapshot_tx);
                    }

                    _ = clock.tick() => {
                        if player.is_playing() {
                            player.tick();
                            publish(&player, &snapshot_tx);
                        }
                    }
                }
            }
            info!("Player service task finished");
        });

        Self {
            commands: cmd_tx,
            snapshot_rx,
            stop_signal,
            shutdown_notify,
            task: AsyncMutex::new(Some(handle)),
        }
    }

    /// Latest published state.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch channel following every published state change.
    pub fn snapshot_receiver(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn send(&self, command: PlayerCommand) {
        if self.commands.send(command).is_err() {
            warn!("Player service is gone; command dropped");
        }
    }

    // ---------- command wrappers ----------

    pub fn play(&self, track: Track, context: Option<Vec<Track>>) {
        self.send(PlayerCommand::Play { track, context });
    }

    pub fn toggle_play_pause(&self) {
        self.send(PlayerCommand::TogglePlayPause);
    }

    pub fn next(&self) {
        self.send(PlayerCommand::Next);
    }

    pub fn previous(&self) {
        self.send(PlayerCommand::Previous);
    }

    pub fn seek_to(&self, position_secs: u32) {
        self.send(PlayerCommand::SeekTo { position_secs });
    }

    pub fn add_to_queue(&self, track: Track) {
        self.send(PlayerCommand::AddToQueue { track });
    }

    pub fn remove_from_queue(&self, index: usize) {
        self.send(PlayerCommand::RemoveFromQueue { index });
    }

    pub fn play_from_queue(&self, index: usize) {
        self.send(PlayerCommand::PlayFromQueue { index });
    }

    pub fn clear_queue(&self) {
        self.send(PlayerCommand::ClearQueue);
    }

    pub fn toggle_shuffle(&self) {
        self.send(PlayerCommand::ToggleShuffle);
    }

    pub fn toggle_repeat(&self) {
        self.send(PlayerCommand::ToggleRepeat);
    }

    pub fn song_ended(&self) {
        self.send(PlayerCommand::SongEnded);
    }

    /// Stop the service task and wait for it to finish. After this no clock
    /// tick or command will be applied. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<(), TonearmError> {
        let was_set = !self.stop_signal.swap(true, Ordering::SeqCst);
        self.shutdown_notify.notify_one();

        let handle = {
            let mut task_guard = self.task.lock().await;
            task_guard.take()
        };

        if let Some(h) = handle {
            if was_set {
                debug!("Awaiting player service termination");
                h.await?;
                debug!("Player service joined");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("snapshot", &self.snapshot_rx.borrow().playback_version)
            .finish()
    }
}

// Ensure the handle stops the service task on drop
impl Drop for PlayerHandle {
    fn drop(&mut self) {
        debug!("Dropping PlayerHandle, signaling service task to stop");
        self.stop_signal.store(true, Ordering::SeqCst);
        self.shutdown_notify.notify_one();
    }
}

fn apply(player: &mut Player, command: PlayerCommand) {
    match command {
        PlayerCommand::Play { track, context } => player.play_song(track, context),
        PlayerCommand::TogglePlayPause => player.toggle_play_pause(),
        PlayerCommand::Next => player.play_next(),
        PlayerCommand::Previous => player.play_previous(),
        PlayerCommand::SeekTo { position_secs } => player.seek_to(position_secs),
        PlayerCommand::AddToQueue { track } => player.add_to_queue(track),
        PlayerCommand::RemoveFromQueue { index } => player.remove_from_queue(index),
        PlayerCommand::PlayFromQueue { index } => player.play_from_queue(index),
        PlayerCommand::ClearQueue => player.clear_queue(),
        PlayerCommand::ToggleShuffle => player.toggle_shuffle(),
        PlayerCommand::ToggleRepeat => player.toggle_repeat(),
        PlayerCommand::SongEnded => player.handle_song_end(),
    }
}

fn publish(player: &Player, snapshot_tx: &watch::Sender<PlayerSnapshot>) {
    let snapshot = player.snapshot();
    snapshot_tx.send_if_modified(|prev| {
        if *prev != snapshot {
            *prev = snapshot;
            true
        } else {
            false
        }
    });
}
