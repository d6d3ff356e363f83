use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use reqwest::Client;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::error::TonearmError;
use crate::settings::ReporterConfig;
use crate::tracker::PlayEvent;

// Shared HTTP client with connection pooling, reused across reporter
// instances and process lifetime
static SHARED_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .pool_idle_timeout(Some(Duration::from_secs(600)))
        .pool_max_idle_per_host(8)
        .build()
        .unwrap()
});

// Bounded FIFO of events awaiting upload; overflow drops the oldest first
struct EventBuffer {
    events: VecDeque<PlayEvent>,
    cap: usize,
    dropped: u64,
}

impl EventBuffer {
    fn new(cap: usize) -> Self {
        Self {
            events: VecDeque::new(),
            cap,
            dropped: 0,
        }
    }

    fn push(&mut self, event: PlayEvent) {
        if self.events.len() >= self.cap {
            self.events.pop_front();
            self.dropped += 1;
            warn!(dropped_total = self.dropped, "Report buffer full, dropping oldest event");
        }
        self.events.push_back(event);
    }

    fn drain_batch(&mut self, max: usize) -> Vec<PlayEvent> {
        let take = self.events.len().min(max);
        self.events.drain(..take).collect()
    }

    // Put a failed batch back ahead of everything newer. If that overflows
    // the cap, the oldest events go first, same as push
    fn requeue_front(&mut self, batch: Vec<PlayEvent>) {
        for event in batch.into_iter().rev() {
            self.events.push_front(event);
        }
        while self.events.len() > self.cap {
            self.events.pop_front();
            self.dropped += 1;
        }
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Fire-and-forget uploader for playback lifecycle events.
///
/// Drains the engine's event channel into a bounded local buffer and ships
/// batches to the reporting endpoint, on a flush interval or as soon as a
/// full batch accumulates. Failed batches are requeued and retried on the
/// next interval; delivery is at-least-effort, never exactly-once. The
/// engine is never blocked by any of this.
pub struct PlayReporter {
    // Flag to signal the reporter task to stop
    stop_signal: Arc<AtomicBool>,
    // Shutdown notifier for the reporter task
    shutdown_notify: Arc<Notify>,
    task: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PlayReporter {
    /// Spawn the reporter task draining `events`.
    pub fn spawn(events: mpsc::UnboundedReceiver<PlayEvent>, config: ReporterConfig) -> Self {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let shutdown_notify = Arc::new(Notify::new());

        let stop = stop_signal.clone();
        let notify = shutdown_notify.clone();
        let handle = tokio::spawn(run_reporter(events, config, stop, notify));

        Self {
            stop_signal,
            shutdown_notify,
            task: AsyncMutex::new(Some(handle)),
        }
    }

    /// Stop the reporter after one final best-effort flush. Safe to call
    /// more than once.
    pub async fn shutdown(&self) -> Result<(), TonearmError> {
        let was_set = !self.stop_signal.swap(true, Ordering::SeqCst);
        self.shutdown_notify.notify_one();

        let handle = {
            let mut task_guard = self.task.lock().await;
            task_guard.take()
        };

        if let Some(h) = handle {
            if was_set {
                debug!("Awaiting reporter termination");
                h.await?;
                debug!("Reporter joined");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PlayReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayReporter").finish()
    }
}

// Ensure the reporter stops the background task on drop
impl Drop for PlayReporter {
    fn drop(&mut self) {
        debug!("Dropping PlayReporter, signaling task to stop");
        self.stop_signal.store(true, Ordering::SeqCst);
        self.shutdown_notify.notify_one();
    }
}

async fn run_reporter(
    mut events: mpsc::UnboundedReceiver<PlayEvent>,
    config: ReporterConfig,
    stop_signal: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
) {
    info!(endpoint = %config.endpoint, "Play reporter task started");
    let mut buffer = EventBuffer::new(config.buffer_cap);
    let mut flush_timer = interval(config.flush_interval);
    flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // After a failed upload, hold size-triggered flushes and let the
    // interval pace the retries
    let mut endpoint_healthy = true;

    loop {
        if stop_signal.load(Ordering::Relaxed) {
            break;
        }

        tokio::select! {
            biased;

            _ = shutdown_notify.notified() => {
                debug!("Reporter received shutdown notification");
                break;
            }

            maybe_event = events.recv() => {
                // None means the engine side is gone; flush what we hold
                let Some(event) = maybe_event else {
                    break;
                };
                trace!(kind = event.kind.as_str(), track_id = %event.track_id, "Buffering play event");
                buffer.push(event);
                if endpoint_healthy && buffer.len() >= config.batch_max {
                    endpoint_healthy = flush(&mut buffer, &config).await;
                }
            }

            _ = flush_timer.tick() => {
                if !buffer.is_empty() {
                    endpoint_healthy = flush(&mut buffer, &config).await;
                }
            }
        }
    }

    // Final best-effort flush so a clean shutdown loses nothing queued. Keep
    // draining batch by batch; a failed upload ends the attempt
    while let Ok(event) = events.try_recv() {
        buffer.push(event);
    }
    while !buffer.is_empty() {
        if !flush(&mut buffer, &config).await {
            warn!(remaining = buffer.len(), "Final flush gave up; events lost");
            break;
        }
    }
    info!("Play reporter task finished");
}

// Returns false when the endpoint refused or the request failed; the batch
// is requeued in that case
async fn flush(buffer: &mut EventBuffer, config: &ReporterConfig) -> bool {
    let batch = buffer.drain_batch(config.batch_max);
    if batch.is_empty() {
        return true;
    }
    debug!(count = batch.len(), "Uploading play events");
    match upload(&batch, config).await {
        Ok(()) => {
            trace!("Upload accepted");
            true
        }
        Err(e) => {
            warn!(error = %e, count = batch.len(), "Upload failed; batch requeued");
            buffer.requeue_front(batch);
            false
        }
    }
}

async fn upload(batch: &[PlayEvent], config: &ReporterConfig) -> Result<(), TonearmError> {
    let response = SHARED_CLIENT
        .post(&config.endpoint)
        .timeout(config.request_timeout)
        .json(batch)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(TonearmError::UploadRejected(status.as_u16()));
    }
    Ok(())
}
