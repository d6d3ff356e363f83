use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_util::codec::{BytesCodec, Framed};
use tonearm::{
    ActivityKind, ConnectionState, FrameCodec, StatsStreamClient, StreamConfig, StreamEvent,
};

async fn bind_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

// An address nothing is listening on
async fn free_addr() -> String {
    let (listener, addr) = bind_listener().await;
    drop(listener);
    addr
}

type ServerFrames = Framed<TcpStream, FrameCodec>;

async fn accept_framed(listener: &TcpListener) -> ServerFrames {
    let (socket, _) = listener.accept().await.unwrap();
    Framed::new(socket, FrameCodec::new())
}

// Keep the session alive, swallowing the client's keep-alive pings
async fn read_to_end(mut framed: ServerFrames) {
    while let Some(frame) = framed.next().await {
        if frame.is_err() {
            break;
        }
    }
}

// Test the initial snapshot replaces, periodic merges, play updates feed
#[tokio::test]
async fn test_snapshot_replace_merge_and_activity() {
    let (listener, addr) = bind_listener().await;
    tokio::spawn(async move {
        let mut framed = accept_framed(&listener).await;
        framed
            .send(
                json!({
                    "type": "initial",
                    "timestamp": 1724500000000i64,
                    "stats": { "total_plays": 10, "plays_today": 2 }
                })
                .to_string(),
            )
            .await
            .unwrap();
        framed
            .send(json!({ "type": "periodic", "stats": { "total_plays": 11 } }).to_string())
            .await
            .unwrap();
        framed
            .send(
                json!({
                    "type": "play_update",
                    "event_type": "started",
                    "track_id": "t1",
                    "title": "Song One"
                })
                .to_string(),
            )
            .await
            .unwrap();
        read_to_end(framed).await;
    });

    let client = StatsStreamClient::new(StreamConfig::for_addr(addr));
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    match events.recv().await.unwrap() {
        StreamEvent::StatsReplaced(stats) => {
            assert_eq!(stats.total_plays, Some(10));
            assert_eq!(stats.plays_today, Some(2));
        }
        other => panic!("Expected StatsReplaced, got {:?}", other),
    }

    match events.recv().await.unwrap() {
        StreamEvent::StatsMerged(stats) => {
            assert_eq!(stats.total_plays, Some(11));
            // The partial update did not carry this; the held value survives
            assert_eq!(stats.plays_today, Some(2));
        }
        other => panic!("Expected StatsMerged, got {:?}", other),
    }

    match events.recv().await.unwrap() {
        StreamEvent::Activity(item) => {
            assert_eq!(item.track_id, "t1");
            assert_eq!(item.kind, ActivityKind::Started);
            assert_eq!(item.label(), "Song One");
        }
        other => panic!("Expected Activity, got {:?}", other),
    }

    assert!(client.is_connected());
    assert_eq!(client.stats().total_plays, Some(11));
    assert_eq!(client.activity().len(), 1);
    assert!(client.last_update().is_some());

    client.disconnect().await.unwrap();
}

// Test the activity feed is newest-first and bounded by the configured cap
#[tokio::test]
async fn test_activity_feed_bounded_newest_first() {
    let (listener, addr) = bind_listener().await;
    tokio::spawn(async move {
        let mut framed = accept_framed(&listener).await;
        for i in 0..25 {
            framed
                .send(
                    json!({
                        "type": "play_update",
                        "event_type": "completed",
                        "track_id": format!("t{}", i)
                    })
                    .to_string(),
                )
                .await
                .unwrap();
        }
        read_to_end(framed).await;
    });

    let client = StatsStreamClient::new(StreamConfig::for_addr(addr));
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    for _ in 0..25 {
        match events.recv().await.unwrap() {
            StreamEvent::Activity(_) => {}
            other => panic!("Expected Activity, got {:?}", other),
        }
    }

    let feed = client.activity();
    assert_eq!(feed.len(), 20);
    assert_eq!(feed.first().map(|i| i.track_id.as_str()), Some("t24"));
    assert_eq!(feed.last().map(|i| i.track_id.as_str()), Some("t5"));

    client.disconnect().await.unwrap();
}

// Test a malformed payload is dropped without killing the connection
#[tokio::test]
async fn test_malformed_payload_is_dropped() {
    let (listener, addr) = bind_listener().await;
    tokio::spawn(async move {
        let mut framed = accept_framed(&listener).await;
        framed.send("this is not json".to_string()).await.unwrap();
        framed
            .send(json!({ "type": "initial", "stats": { "total_plays": 7 } }).to_string())
            .await
            .unwrap();
        read_to_end(framed).await;
    });

    let client = StatsStreamClient::new(StreamConfig::for_addr(addr));
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    // The snapshot behind the garbage frame still arrives
    match events.recv().await.unwrap() {
        StreamEvent::StatsReplaced(stats) => assert_eq!(stats.total_plays, Some(7)),
        other => panic!("Expected StatsReplaced, got {:?}", other),
    }
    assert!(client.is_connected());
    assert!(client.last_error().is_none());

    client.disconnect().await.unwrap();
}

// Test keep-alive pings go out once per interval, starting one interval in
#[tokio::test(start_paused = true)]
async fn test_keepalive_ping_cadence() {
    let (listener, addr) = bind_listener().await;
    let (ping_tx, mut pings) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut framed = accept_framed(&listener).await;
        let opened = Instant::now();
        while let Some(Ok(frame)) = framed.next().await {
            let msg: serde_json::Value = serde_json::from_str(&frame).unwrap();
            if msg["type"] == "ping" {
                let _ = ping_tx.send(opened.elapsed());
            }
        }
    });

    let client = StatsStreamClient::new(StreamConfig::for_addr(addr));
    client.connect().await.unwrap();

    let first = pings.recv().await.unwrap();
    let second = pings.recv().await.unwrap();

    assert!(first >= Duration::from_secs(25));
    assert!(second >= Duration::from_secs(50));
    assert!(second - first >= Duration::from_secs(25));
    assert!(second - first < Duration::from_secs(26));

    client.disconnect().await.unwrap();
}

// Test the reconnect schedule doubles per attempt and then goes terminal
#[tokio::test(start_paused = true)]
async fn test_backoff_schedule_then_terminal_failure() {
    let addr = free_addr().await;
    let client = StatsStreamClient::new(StreamConfig::for_addr(addr));
    let mut states = client.state_receiver();

    client.connect().await.unwrap();

    let mut waits = Vec::new();
    loop {
        states.changed().await.unwrap();
        let state = states.borrow_and_update().clone();
        match state {
            ConnectionState::WaitingToReconnect { backoff, attempt } => {
                waits.push((backoff, attempt));
            }
            ConnectionState::Failed(reason) => {
                assert!(reason.contains("exhausted"));
                break;
            }
            _ => {}
        }
    }

    assert_eq!(
        waits,
        vec![
            (Duration::from_secs(1), 1),
            (Duration::from_secs(2), 2),
            (Duration::from_secs(4), 3),
            (Duration::from_secs(8), 4),
            (Duration::from_secs(16), 5),
        ]
    );

    assert!(client.current_state().is_terminal());
    assert!(!client.is_connected());
    assert!(client.last_error().unwrap().contains("exhausted"));
}

// Test an explicit connect() is the way out of the terminal failure state
#[tokio::test(start_paused = true)]
async fn test_connect_after_terminal_failure() {
    let addr = free_addr().await;
    let mut config = StreamConfig::for_addr(addr.clone());
    config.max_reconnect_attempts = 2;

    let client = StatsStreamClient::new(config);
    let mut states = client.state_receiver();
    client.connect().await.unwrap();
    states.wait_for(|s| s.is_terminal()).await.unwrap();

    // Bring a backend up on the same address, then re-enable the stream
    let listener = TcpListener::bind(&addr).await.unwrap();
    tokio::spawn(async move {
        let framed = accept_framed(&listener).await;
        read_to_end(framed).await;
    });

    client.connect().await.unwrap();
    states.wait_for(|s| s.is_connected()).await.unwrap();

    assert!(client.is_connected());
    assert!(client.last_error().is_none());

    client.disconnect().await.unwrap();
    assert_eq!(client.current_state(), ConnectionState::Disconnected);
}

// Test a dropped connection is retried and recovers
#[tokio::test(start_paused = true)]
async fn test_reconnects_after_server_drop() {
    let (listener, addr) = bind_listener().await;
    let (accepted_tx, mut accepted) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        // First session dies immediately; the second one stays up
        let (first, _) = listener.accept().await.unwrap();
        let _ = accepted_tx.send(1u32);
        drop(first);
        let framed = accept_framed(&listener).await;
        let _ = accepted_tx.send(2u32);
        read_to_end(framed).await;
    });

    let client = StatsStreamClient::new(StreamConfig::for_addr(addr));
    let mut states = client.state_receiver();
    client.connect().await.unwrap();

    assert_eq!(accepted.recv().await, Some(1));
    assert_eq!(accepted.recv().await, Some(2));
    states.wait_for(|s| s.is_connected()).await.unwrap();
    // The successful reopen cleared the close reason
    assert!(client.last_error().is_none());

    client.disconnect().await.unwrap();
}

// Test the refresh round trip, and that offline refreshes are swallowed
#[tokio::test]
async fn test_refresh_round_trip() {
    let (listener, addr) = bind_listener().await;
    let (refresh_tx, mut refreshed) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut framed = accept_framed(&listener).await;
        framed
            .send(
                json!({ "type": "initial", "stats": { "total_plays": 5, "plays_today": 3 } })
                    .to_string(),
            )
            .await
            .unwrap();
        while let Some(Ok(frame)) = framed.next().await {
            let msg: serde_json::Value = serde_json::from_str(&frame).unwrap();
            if msg["type"] == "refresh" {
                let _ = refresh_tx.send(());
                framed
                    .send(
                        json!({ "type": "refresh", "stats": { "total_plays": 99 } }).to_string(),
                    )
                    .await
                    .unwrap();
            }
        }
    });

    let client = StatsStreamClient::new(StreamConfig::for_addr(addr));
    // Nothing is connected yet; this must be silently ignored
    client.refresh();

    let mut events = client.subscribe();
    let mut states = client.state_receiver();
    client.connect().await.unwrap();
    states.wait_for(|s| s.is_connected()).await.unwrap();

    match events.recv().await.unwrap() {
        StreamEvent::StatsReplaced(stats) => assert_eq!(stats.plays_today, Some(3)),
        other => panic!("Expected StatsReplaced, got {:?}", other),
    }

    client.refresh();
    refreshed.recv().await.unwrap();

    match events.recv().await.unwrap() {
        StreamEvent::StatsReplaced(stats) => {
            assert_eq!(stats.total_plays, Some(99));
            // A full snapshot replaces wholesale: fields it does not carry
            // are dropped, not preserved from the previous one
            assert_eq!(stats.plays_today, None);
        }
        other => panic!("Expected StatsReplaced, got {:?}", other),
    }
    assert_eq!(client.stats().total_plays, Some(99));
    assert_eq!(client.stats().plays_today, None);

    client.disconnect().await.unwrap();
}

// Test teardown is safe from any state and the client can come back
#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (listener, addr) = bind_listener().await;
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(read_to_end(Framed::new(socket, FrameCodec::new())));
        }
    });

    let client = StatsStreamClient::new(StreamConfig::for_addr(addr));

    // Disconnecting before ever connecting is fine
    client.disconnect().await.unwrap();

    client.connect().await.unwrap();
    client
        .state_receiver()
        .wait_for(|s| s.is_connected())
        .await
        .unwrap();

    client.disconnect().await.unwrap();
    client.disconnect().await.unwrap();
    assert_eq!(client.current_state(), ConnectionState::Disconnected);
    assert!(!client.is_connected());

    // And the stream can be enabled again afterwards
    client.connect().await.unwrap();
    client
        .state_receiver()
        .wait_for(|s| s.is_connected())
        .await
        .unwrap();
    client.disconnect().await.unwrap();
}

// Test a framing violation tears the connection down for a clean reopen
#[tokio::test]
async fn test_framing_violation_forces_reconnect() {
    let (listener, addr) = bind_listener().await;
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut raw = Framed::new(socket, BytesCodec::new());
        // Declares a frame far past the cap
        raw.send(Bytes::from_static(b"999999\n")).await.unwrap();
        // Hold the socket open so closing is the client's decision
        let _ = raw.next().await;
    });

    let client = StatsStreamClient::new(StreamConfig::for_addr(addr));
    let mut states = client.state_receiver();
    client.connect().await.unwrap();

    states
        .wait_for(|s| matches!(s, ConnectionState::WaitingToReconnect { .. }))
        .await
        .unwrap();
    assert!(client.last_error().unwrap().contains("read failed"));

    client.disconnect().await.unwrap();
}
