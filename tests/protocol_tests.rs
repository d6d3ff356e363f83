use bytes::BytesMut;
use serde_json::json;
use tokio_util::codec::{Decoder, Encoder};
use tonearm::{
    ActivityKind, ClientMessage, FrameCodec, ServerMessage, StatsSnapshot, TonearmError,
    MAX_FRAME_BYTES,
};

// Test the initial full snapshot parses, ignoring fields we do not know
#[test]
fn test_initial_message_parses() {
    let payload = json!({
        "type": "initial",
        "timestamp": 1724500000000i64,
        "stats": {
            "total_plays": 1042,
            "unique_songs": 311,
            "unique_artists": 64,
            "current_streak_days": 12,
            "completion_rate": 0.83,
            "experimental_field": true
        }
    });

    let message: ServerMessage = serde_json::from_value(payload).unwrap();
    match message {
        ServerMessage::Initial { timestamp, stats } => {
            assert_eq!(timestamp, Some(1724500000000));
            assert_eq!(stats.total_plays, Some(1042));
            assert_eq!(stats.unique_songs, Some(311));
            assert_eq!(stats.completion_rate, Some(0.83));
            // Fields the backend never sent stay absent
            assert_eq!(stats.plays_today, None);
        }
        other => panic!("Expected Initial, got {:?}", other),
    }
}

// Test a play update with only the required fields present
#[test]
fn test_play_update_with_minimal_fields() {
    let payload = json!({
        "type": "play_update",
        "event_type": "started",
        "track_id": "t1"
    });

    let message: ServerMessage = serde_json::from_value(payload).unwrap();
    match message {
        ServerMessage::PlayUpdate {
            timestamp,
            event_type,
            track_id,
            title,
            artist,
            stats,
        } => {
            assert_eq!(timestamp, None);
            assert_eq!(event_type, ActivityKind::Started);
            assert_eq!(track_id, "t1");
            assert_eq!(title, None);
            assert_eq!(artist, None);
            assert_eq!(stats, None);
        }
        other => panic!("Expected PlayUpdate, got {:?}", other),
    }
}

// Test an unknown type discriminator is rejected as malformed
#[test]
fn test_unknown_message_type_is_rejected() {
    let result: Result<ServerMessage, _> =
        serde_json::from_value(json!({ "type": "mystery", "stats": {} }));
    assert!(result.is_err());
}

// Test the exact bytes this client puts on the wire
#[test]
fn test_client_message_wire_shape() {
    assert_eq!(
        serde_json::to_string(&ClientMessage::Ping).unwrap(),
        r#"{"type":"ping"}"#
    );
    assert_eq!(
        serde_json::to_string(&ClientMessage::Refresh).unwrap(),
        r#"{"type":"refresh"}"#
    );
}

// Test shallow merging keeps fields the partial update did not carry
#[test]
fn test_stats_merge_keeps_absent_fields() {
    let mut held = StatsSnapshot {
        total_plays: Some(100),
        plays_today: Some(5),
        completion_rate: Some(0.5),
        ..StatsSnapshot::default()
    };
    let partial = StatsSnapshot {
        total_plays: Some(101),
        ..StatsSnapshot::default()
    };

    assert!(held.merge_from(&partial));
    assert_eq!(held.total_plays, Some(101));
    assert_eq!(held.plays_today, Some(5));
    assert_eq!(held.completion_rate, Some(0.5));

    // Merging the same values again changes nothing
    assert!(!held.merge_from(&partial));
}

// Test decoding across arbitrary buffer boundaries
#[test]
fn test_codec_decodes_split_frames() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();

    buf.extend_from_slice(b"5\nhe");
    assert_eq!(codec.decode(&mut buf).unwrap(), None);

    buf.extend_from_slice(b"llo");
    assert_eq!(codec.decode(&mut buf).unwrap(), Some("hello".to_string()));

    // Two complete frames buffered back to back
    buf.extend_from_slice(b"3\nabc6\nfoobar");
    assert_eq!(codec.decode(&mut buf).unwrap(), Some("abc".to_string()));
    assert_eq!(codec.decode(&mut buf).unwrap(), Some("foobar".to_string()));
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
}

// Test a non-numeric size header is a protocol violation
#[test]
fn test_codec_rejects_bad_header() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from(&b"abc\n{}"[..]);

    let err = codec.decode(&mut buf).unwrap_err();
    assert!(matches!(err, TonearmError::InvalidFrameHeader(_)));
}

// Test a declared size past the cap is refused before buffering the payload
#[test]
fn test_codec_rejects_oversized_frame() {
    let mut codec = FrameCodec::new();
    let header = format!("{}\n", MAX_FRAME_BYTES + 1);
    let mut buf = BytesMut::from(header.as_bytes());

    let err = codec.decode(&mut buf).unwrap_err();
    assert!(matches!(err, TonearmError::FrameTooLarge { .. }));
}

// Test encoding prefixes the payload with its decimal length
#[test]
fn test_codec_encodes_length_prefix() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();

    codec.encode("hello".to_string(), &mut buf).unwrap();
    assert_eq!(&buf[..], b"5\nhello");

    let oversized = "x".repeat(MAX_FRAME_BYTES + 1);
    let err = codec.encode(oversized, &mut buf).unwrap_err();
    assert!(matches!(err, TonearmError::FrameTooLarge { .. }));
}

// Test activity kinds use their wire names in both directions
#[test]
fn test_activity_kind_wire_names() {
    assert_eq!(ActivityKind::Completed.as_str(), "completed");
    let kind: ActivityKind = serde_json::from_value(json!("skipped")).unwrap();
    assert_eq!(kind, ActivityKind::Skipped);
    assert_eq!(serde_json::to_value(ActivityKind::Resumed).unwrap(), json!("resumed"));
}
