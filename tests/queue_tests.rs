use tonearm::{PlayQueue, Track};

fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Track {}", id),
        artist: "Test Artist".to_string(),
        album: None,
        artwork_url: None,
        duration_secs: 180,
    }
}

fn up_next_ids(queue: &PlayQueue) -> Vec<String> {
    queue.up_next().map(|t| t.id.clone()).collect()
}

// Test context replacement resolves the position by track id
#[test]
fn test_replace_context_resolves_position() {
    let mut queue = PlayQueue::new();

    queue.replace_context(vec![track("a"), track("b"), track("c")], "b");
    assert_eq!(queue.current_index(), Some(1));
    assert_eq!(queue.context_len(), 3);

    // The playing track does not occur in the new list
    queue.replace_context(vec![track("x"), track("y")], "b");
    assert_eq!(queue.current_index(), None);
    assert_eq!(queue.context_len(), 2);

    assert_eq!(queue.position_of("y"), Some(1));
    assert_eq!(queue.position_of("missing"), None);
}

// Test that an out-of-range index clears the position instead of storing it
#[test]
fn test_set_current_index_rejects_out_of_range() {
    let mut queue = PlayQueue::new();
    queue.replace_context(vec![track("a"), track("b")], "a");

    queue.set_current_index(Some(5));
    assert_eq!(queue.current_index(), None);

    queue.set_current_index(Some(1));
    assert_eq!(queue.current_index(), Some(1));

    queue.set_current_index(None);
    assert_eq!(queue.current_index(), None);
}

// Test the up-next line is consumed strictly first-in first-out
#[test]
fn test_up_next_is_fifo() {
    let mut queue = PlayQueue::new();
    queue.push_up_next(track("a"));
    queue.push_up_next(track("b"));
    queue.push_up_next(track("c"));

    assert_eq!(queue.up_next_len(), 3);
    assert!(queue.has_up_next());

    assert_eq!(queue.pop_up_next().map(|t| t.id), Some("a".to_string()));
    assert_eq!(queue.pop_up_next().map(|t| t.id), Some("b".to_string()));
    assert_eq!(queue.pop_up_next().map(|t| t.id), Some("c".to_string()));
    assert_eq!(queue.pop_up_next(), None);
    assert!(!queue.has_up_next());
}

// Test removing a single queued entry
#[test]
fn test_remove_up_next() {
    let mut queue = PlayQueue::new();
    queue.push_up_next(track("a"));
    queue.push_up_next(track("b"));
    queue.push_up_next(track("c"));

    // Out of range changes nothing
    assert_eq!(queue.remove_up_next(7), None);
    assert_eq!(queue.up_next_len(), 3);

    assert_eq!(queue.remove_up_next(1).map(|t| t.id), Some("b".to_string()));
    assert_eq!(up_next_ids(&queue), vec!["a", "c"]);
}

// Test skip-ahead promotion drops everything queued ahead of the pick
#[test]
fn test_promote_drops_skipped_entries() {
    let mut queue = PlayQueue::new();
    queue.push_up_next(track("a"));
    queue.push_up_next(track("b"));
    queue.push_up_next(track("c"));
    queue.push_up_next(track("d"));

    let picked = queue.promote_up_next(2);
    assert_eq!(picked.map(|t| t.id), Some("c".to_string()));
    // a and b were skipped over and are gone; d keeps its place
    assert_eq!(up_next_ids(&queue), vec!["d"]);
}

// Test promotion with an out-of-range index is a no-op
#[test]
fn test_promote_out_of_range_changes_nothing() {
    let mut queue = PlayQueue::new();
    queue.push_up_next(track("a"));

    assert_eq!(queue.promote_up_next(3), None);
    assert_eq!(up_next_ids(&queue), vec!["a"]);
}

// Test clearing the up-next line leaves the context list alone
#[test]
fn test_clear_up_next_leaves_context() {
    let mut queue = PlayQueue::new();
    queue.replace_context(vec![track("a"), track("b")], "a");
    queue.push_up_next(track("x"));
    queue.push_up_next(track("y"));

    queue.clear_up_next();

    assert!(!queue.has_up_next());
    assert_eq!(queue.context_len(), 2);
    assert_eq!(queue.current_index(), Some(0));
    assert_eq!(queue.track_at(1).map(|t| t.id.as_str()), Some("b"));
}
