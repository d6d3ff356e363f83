use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures::{FutureExt, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, Mutex as AsyncMutex, Notify};
use tokio::time::{interval_at, sleep, timeout, Duration, Instant};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

use crate::codec::FrameCodec;
use crate::error::TonearmError;
use crate::events::{ActivityItem, StreamEvent};
use crate::models::StatsSnapshot;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::settings::StreamConfig;
use crate::state::{ConnectionState, StreamState};

// Everything the background manager task needs, bundled so the spawn stays
// readable
struct ManagerContext {
    config: StreamConfig,
    state: Arc<RwLock<StreamState>>,
    event_sender: broadcast::Sender<StreamEvent>,
    shutdown_notify: Arc<Notify>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
}

// Why the manager task left its loop
enum ManagerExit {
    Stopped,
    Failed(String),
}

// Why a connected session ended
enum SessionEnd {
    Shutdown,
    Closed(String),
}

/// Client for the live listening-stats push stream.
///
/// One background manager task owns the whole connection lifecycle: opening
/// the socket, keep-alive pings, dispatching inbound frames into the shared
/// stats/activity state, and reconnecting with exponential backoff until the
/// retry budget runs out. After the budget is spent the client stays in
/// [`ConnectionState::Failed`] until [`connect`](Self::connect) is called
/// again.
///
/// # Logging
///
/// This library uses the `tracing` crate for logging. To see logs, install a
/// subscriber in the application, for example:
/// ```no_run
/// use tracing::Level;
/// use tracing_subscriber::FmtSubscriber;
///
/// let subscriber = FmtSubscriber::builder()
///     .with_max_level(Level::DEBUG)
///     .finish();
/// tracing::subscriber::set_global_default(subscriber)
///     .expect("Failed to set tracing subscriber");
/// ```
pub struct StatsStreamClient {
    config: StreamConfig,
    state: Arc<RwLock<StreamState>>,
    event_sender: broadcast::Sender<StreamEvent>,
    // Outbound frames (refresh nudges) funnel through the manager task
    outbound_tx: mpsc::UnboundedSender<ClientMessage>,
    outbound_rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<ClientMessage>>>,
    // Flag to signal the manager task to stop
    stop_signal: Arc<AtomicBool>,
    // JoinHandle for the manager task
    management_task: Arc<AsyncMutex<Option<tokio::task::JoinHandle<()>>>>,
    // Shutdown notifier for the manager task
    shutdown_notify: Arc<Notify>,
    // Watch channel for observing the connection state
    connection_state_tx: Arc<watch::Sender<ConnectionState>>,
    connection_state_rx: watch::Receiver<ConnectionState>,
}

impl StatsStreamClient {
    pub fn new(config: StreamConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_buffer_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self {
            config,
            state: Arc::new(RwLock::new(StreamState::new())),
            event_sender: event_tx,
            outbound_tx,
            outbound_rx: Arc::new(AsyncMutex::new(outbound_rx)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            management_task: Arc::new(AsyncMutex::new(None)),
            shutdown_notify: Arc::new(Notify::new()),
            connection_state_tx: Arc::new(state_tx),
            connection_state_rx: state_rx,
        }
    }

    // ---------- observation ----------

    /// Current connection state; see [`state_receiver`](Self::state_receiver)
    /// for change notifications.
    pub fn current_state(&self) -> ConnectionState {
        self.connection_state_rx.borrow().clone()
    }

    /// Watch channel following every connection state transition, including
    /// the backoff delay carried by `WaitingToReconnect`.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.connection_state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.current_state().is_connected()
    }

    /// Subscribe to stats/activity change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.event_sender.subscribe()
    }

    /// Latest aggregate counters pushed by the backend.
    pub fn stats(&self) -> StatsSnapshot {
        self.state.read().unwrap().stats.clone()
    }

    /// Rolling activity feed, newest first, bounded by the configured cap.
    pub fn activity(&self) -> Vec<ActivityItem> {
        self.state.read().unwrap().activity.iter().cloned().collect()
    }

    /// Most recent transient or terminal error, if any. Cleared on the next
    /// successful open and by [`connect`](Self::connect).
    pub fn last_error(&self) -> Option<String> {
        self.state.read().unwrap().error.clone()
    }

    /// When the last inbound frame (of any type) arrived.
    pub fn last_update(&self) -> Option<std::time::Instant> {
        self.state.read().unwrap().last_update
    }

    // ---------- control ----------

    /// Ask the backend for a fresh full snapshot. Silently ignored unless
    /// the socket is currently open.
    pub fn refresh(&self) {
        if !self.is_connected() {
            debug!("Refresh requested while not connected; ignoring");
            return;
        }
        debug!("Requesting stats refresh");
        let _ = self.outbound_tx.send(ClientMessage::Refresh);
    }

    /// Enable the stream: starts the background manager task, which connects
    /// and keeps reconnecting within the retry budget. Also the explicit
    /// re-enable after a terminal failure; any previous manager is torn down
    /// first so the cycle always starts clean.
    pub async fn connect(&self) -> Result<(), TonearmError> {
        info!(addr = %self.config.addr, "Enabling stats stream");

        self.stop_and_await_manager().await?;

        // Clear any previous stop signal
        self.stop_signal.store(false, Ordering::SeqCst);
        // Reset the notification for a fresh start
        while self.shutdown_notify.notified().now_or_never().is_some() {}
        {
            let mut state = self.state.write().unwrap();
            state.error = None;
        }
        let _ = self.connection_state_tx.send(ConnectionState::Connecting);

        self.start_manager().await;
        Ok(())
    }

    /// Disable the stream: cancels keep-alive and backoff timers, closes the
    /// socket, and awaits the manager task. Safe to call from any state, any
    /// number of times.
    pub async fn disconnect(&self) -> Result<(), TonearmError> {
        info!("Disabling stats stream");
        self.stop_and_await_manager().await?;
        let _ = self
            .connection_state_tx
            .send_replace(ConnectionState::Disconnected);
        Ok(())
    }

    async fn start_manager(&self) {
        let ctx = ManagerContext {
            config: self.config.clone(),
            state: self.state.clone(),
            event_sender: self.event_sender.clone(),
            shutdown_notify: self.shutdown_notify.clone(),
            state_tx: self.connection_state_tx.clone(),
        };
        let outbound_rx = self.outbound_rx.clone();
        let stop_signal = self.stop_signal.clone();

        let handle = tokio::spawn(async move {
            info!("Stats stream manager task started");
            // The manager is the sole consumer of outbound frames for its
            // whole life; connect() guarantees the previous manager is gone
            let mut outbound = outbound_rx.lock().await;
            let mut attempts: u32 = 0;

            let exit = loop {
                if stop_signal.load(Ordering::Relaxed) {
                    break ManagerExit::Stopped;
                }

                let _ = ctx.state_tx.send(ConnectionState::Connecting);
                debug!(addr = %ctx.config.addr, "Opening stats stream connection");

                let connect_result = tokio::select! {
                    biased;
                    _ = ctx.shutdown_notify.notified() => break ManagerExit::Stopped,
                    res = timeout(
                        ctx.config.connect_timeout,
                        TcpStream::connect(&ctx.config.addr),
                    ) => res,
                };

                match connect_result {
                    Ok(Ok(socket)) => {
                        attempts = 0;
                        clear_error(&ctx.state);
                        let _ = ctx.state_tx.send(ConnectionState::Connected);
                        info!("Stats stream connected");

                        // Nudges queued while the socket was down are stale
                        while outbound.try_recv().is_ok() {}

                        match run_connected(&ctx, socket, &mut outbound).await {
                            SessionEnd::Shutdown => break ManagerExit::Stopped,
                            SessionEnd::Closed(reason) => {
                                warn!(%reason, "Stats stream connection closed");
                                set_error(&ctx.state, &reason);
                                let _ = ctx.state_tx.send(ConnectionState::Disconnected);
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "Stats stream connect failed");
                        set_error(&ctx.state, &format!("connect failed: {}", e));
                        let _ = ctx.state_tx.send(ConnectionState::Disconnected);
                    }
                    Err(_) => {
                        let err = TonearmError::ConnectTimeout(ctx.config.connect_timeout);
                        warn!("{}", err);
                        set_error(&ctx.state, &err.to_string());
                        let _ = ctx.state_tx.send(ConnectionState::Disconnected);
                    }
                }

                // Close handler: schedule the next attempt or give up
                if attempts >= ctx.config.max_reconnect_attempts {
                    let err = TonearmError::RetriesExhausted(attempts);
                    error!("{}", err);
                    set_error(&ctx.state, &err.to_string());
                    break ManagerExit::Failed(err.to_string());
                }

                let delay =
                    backoff_delay(ctx.config.base_backoff, ctx.config.max_backoff, attempts);
                attempts += 1;
                let _ = ctx.state_tx.send(ConnectionState::WaitingToReconnect {
                    backoff: delay,
                    attempt: attempts,
                });
                debug!(attempt = attempts, "Backing off for {:?}", delay);
                tokio::select! {
                    biased;
                    _ = ctx.shutdown_notify.notified() => break ManagerExit::Stopped,
                    _ = sleep(delay) => {}
                }
            };

            match exit {
                ManagerExit::Stopped => {
                    info!("Stats stream manager task finished");
                    let _ = ctx.state_tx.send(ConnectionState::Stopping);
                    let _ = ctx.state_tx.send_replace(ConnectionState::Disconnected);
                }
                ManagerExit::Failed(reason) => {
                    // Terminal: stays visible until an explicit re-enable
                    let _ = ctx.state_tx.send_replace(ConnectionState::Failed(reason));
                }
            }
        });

        // Store the JoinHandle
        {
            let mut task_guard = self.management_task.lock().await;
            *task_guard = Some(handle);
            debug!("Stored manager task JoinHandle");
        }
    }

    // Helper to stop and await the manager task
    async fn stop_and_await_manager(&self) -> Result<(), TonearmError> {
        let was_set = !self.stop_signal.swap(true, Ordering::SeqCst);
        self.shutdown_notify.notify_one();

        let handle = {
            let mut task_guard = self.management_task.lock().await;
            task_guard.take()
        };

        if let Some(h) = handle {
            if was_set {
                debug!("Awaiting manager task termination");
                h.await?;
                debug!("Manager task joined");
            } else {
                debug!("Manager task was already stopping");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for StatsStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsStreamClient")
            .field("addr", &self.config.addr)
            .field("state", &self.current_state())
            .finish()
    }
}

// Ensure the client stops the background task on drop
impl Drop for StatsStreamClient {
    fn drop(&mut self) {
        debug!("Dropping StatsStreamClient, signaling manager task to stop");
        self.stop_signal.store(true, Ordering::SeqCst);
        self.shutdown_notify.notify_one();
    }
}

// One connected session: pump frames both ways until the socket dies or
// shutdown is requested
async fn run_connected(
    ctx: &ManagerContext,
    socket: TcpStream,
    outbound: &mut mpsc::UnboundedReceiver<ClientMessage>,
) -> SessionEnd {
    let mut framed = Framed::new(socket, FrameCodec::new());
    // First ping goes out one full interval after the open, not immediately
    let mut keepalive = interval_at(
        Instant::now() + ctx.config.keepalive_interval,
        ctx.config.keepalive_interval,
    );

    loop {
        tokio::select! {
            biased;

            _ = ctx.shutdown_notify.notified() => {
                debug!("Shutdown requested during stats stream session");
                return SessionEnd::Shutdown;
            }

            _ = keepalive.tick() => {
                trace!("Sending keep-alive ping");
                if let Err(e) = send_message(&mut framed, ClientMessage::Ping).await {
                    return SessionEnd::Closed(format!("keep-alive send failed: {}", e));
                }
            }

            maybe_msg = outbound.recv() => {
                // The sender lives as long as the client; None only happens
                // when the client itself is being torn down
                let Some(msg) = maybe_msg else {
                    return SessionEnd::Shutdown;
                };
                debug!(kind = msg.message_type(), "Sending client frame");
                if let Err(e) = send_message(&mut framed, msg).await {
                    return SessionEnd::Closed(format!("send failed: {}", e));
                }
            }

            frame = framed.next() => {
                match frame {
                    Some(Ok(raw)) => dispatch_frame(ctx, &raw),
                    // A framing error desyncs the byte stream; only a fresh
                    // connection recovers from that
                    Some(Err(e)) => return SessionEnd::Closed(format!("read failed: {}", e)),
                    None => return SessionEnd::Closed("server closed the connection".to_string()),
                }
            }
        }
    }
}

async fn send_message(
    framed: &mut Framed<TcpStream, FrameCodec>,
    msg: ClientMessage,
) -> Result<(), TonearmError> {
    let payload = serde_json::to_string(&msg)?;
    framed.send(payload).await
}

// Apply one inbound frame to the shared state. Malformed payloads are
// dropped with a warning; they never kill the connection
fn dispatch_frame(ctx: &ManagerContext, raw: &str) {
    let message: ServerMessage = match serde_json::from_str(raw) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, raw_len = raw.len(), "Dropping malformed stream frame");
            return;
        }
    };
    trace!(kind = message.message_type(), "Stream frame received");

    let mut state = ctx.state.write().unwrap();
    state.record_update();

    match message {
        ServerMessage::Initial { stats, .. } | ServerMessage::Refresh { stats, .. } => {
            state.stats = stats.clone();
            drop(state);
            let _ = ctx.event_sender.send(StreamEvent::StatsReplaced(stats));
        }
        ServerMessage::Periodic { stats, .. } => {
            if state.stats.merge_from(&stats) {
                let merged = state.stats.clone();
                drop(state);
                let _ = ctx.event_sender.send(StreamEvent::StatsMerged(merged));
            }
        }
        ServerMessage::PlayUpdate {
            timestamp,
            event_type,
            track_id,
            title,
            artist,
            stats,
        } => {
            if let Some(partial) = &stats {
                state.stats.merge_from(partial);
            }
            let item = ActivityItem {
                kind: event_type,
                track_id,
                title,
                artist,
                timestamp,
            };
            state.push_activity(item.clone(), ctx.config.activity_cap);
            drop(state);
            let _ = ctx.event_sender.send(StreamEvent::Activity(item));
        }
        ServerMessage::Pong { .. } => {
            trace!("Keep-alive pong received");
        }
    }
}

fn set_error(state: &Arc<RwLock<StreamState>>, reason: &str) {
    state.write().unwrap().error = Some(reason.to_string());
}

fn clear_error(state: &Arc<RwLock<StreamState>>) {
    state.write().unwrap().error = None;
}

/// Reconnect delay for the given attempt count: the base doubled per
/// attempt, capped at `max`.
fn backoff_delay(base: Duration, max: Duration, attempts: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempts.min(16));
    base.saturating_mul(factor).min(max)
}
