use std::error::Error;

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tonearm::{
    PlayReporter, PlayerHandle, ReporterConfig, StatsStreamClient, StreamConfig, StreamEvent,
    Track,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn track(id: &str, title: &str, artist: &str, duration_secs: u32) -> Track {
    Track {
        id: id.to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        album: Some("Routes".to_string()),
        artwork_url: None,
        duration_secs,
    }
}

/// A small scripted session: plays through an album, queues a detour, and
/// follows the live stats stream if a backend is reachable.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Step 1: Wire the engine to the reporter; telemetry flows through the channel
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let reporter = PlayReporter::spawn(events_rx, ReporterConfig::from_env());
    let player = PlayerHandle::spawn(events_tx);

    // Step 2: Follow the live stats stream. It is fine if nothing is
    // listening; the client backs off and eventually parks itself until
    // connect() is called again
    let stream = StatsStreamClient::new(StreamConfig::from_env());
    let mut stream_events = stream.subscribe();
    stream.connect().await?;
    tokio::spawn(async move {
        while let Ok(event) = stream_events.recv().await {
            match event {
                StreamEvent::StatsReplaced(stats) => {
                    println!("stats snapshot: {:?} total plays", stats.total_plays)
                }
                StreamEvent::StatsMerged(stats) => {
                    println!("stats update: {:?} total plays", stats.total_plays)
                }
                StreamEvent::Activity(item) => println!("activity: {}", item.label()),
            }
        }
    });

    // Step 3: Play an album and poke at the transport
    let album = vec![
        track("t1", "Opening Theme", "Night Bus", 243),
        track("t2", "Second Movement", "Night Bus", 198),
        track("t3", "Closer", "Night Bus", 311),
    ];
    player.play(album[0].clone(), Some(album.clone()));
    sleep(Duration::from_secs(3)).await;

    player.toggle_play_pause();
    println!("paused at {}s", player.snapshot().position_secs);
    sleep(Duration::from_secs(1)).await;
    player.toggle_play_pause();

    // Step 4: Queue something and skip to it
    player.add_to_queue(track("t9", "Detour", "Night Bus", 154));
    player.next();
    sleep(Duration::from_millis(100)).await;
    let snap = player.snapshot();
    println!(
        "now playing: {} (run {})",
        snap.current_track
            .as_ref()
            .map(|t| t.title.as_str())
            .unwrap_or("nothing"),
        snap.playback_version
    );

    // Step 5: Let the clock run, then wind back to the start of the track
    sleep(Duration::from_secs(5)).await;
    player.previous();
    sleep(Duration::from_millis(100)).await;
    println!(
        "position after previous: {}s",
        player.snapshot().position_secs
    );

    // Step 6: Shut everything down; the reporter flushes what it still holds
    player.shutdown().await?;
    stream.disconnect().await?;
    reporter.shutdown().await?;

    Ok(())
}
