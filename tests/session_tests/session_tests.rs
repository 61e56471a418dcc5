//! Tests for the session queue and table
//!
//! These tests verify:
//! - FIFO order and capacity of the inbound queue
//! - Blocking pop and wake-up on close
//! - Concurrent producers never lose or reorder their own messages
//! - Slot lookup and generation-checked handles

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::Rng;
use skirmish::error::{Resource, SkirmishError};
use skirmish::protocol::{Inbound, Message};
use skirmish::session::{MessageQueue, QuickMatchStatus, SessionStatus, SessionTable};

// =============================================================================
// Helper Functions
// =============================================================================

fn open_queue(capacity: usize) -> MessageQueue {
    let queue = MessageQueue::new(0, capacity);
    queue.reopen();
    queue
}

fn frame(message_type: i32, payload: &[u8]) -> Inbound {
    Inbound::Frame(Message::new(0, message_type, Bytes::copy_from_slice(payload)))
}

fn message_type(inbound: &Inbound) -> i32 {
    match inbound {
        Inbound::Frame(message) => message.message_type,
        other => panic!("Expected a frame, got {:?}", other),
    }
}

// =============================================================================
// Queue Tests
// =============================================================================

#[test]
fn test_new_queue_is_closed() {
    let queue = MessageQueue::new(3, 4);
    assert!(queue.is_closed());
    assert!(matches!(queue.push(Inbound::Open), Err(SkirmishError::SessionClosed(3))));
}

#[test]
fn test_fifo_order() {
    let queue = open_queue(8);
    queue.push(Inbound::Open).unwrap();
    queue.push(frame(1, b"a")).unwrap();
    queue.push(frame(2, b"b")).unwrap();
    queue.push(Inbound::Close).unwrap();

    assert_eq!(queue.len(), 4);
    assert_eq!(queue.pop().unwrap(), Inbound::Open);
    assert_eq!(message_type(&queue.pop().unwrap()), 1);
    assert_eq!(message_type(&queue.pop().unwrap()), 2);
    assert_eq!(queue.try_pop(), Some(Inbound::Close));
    assert_eq!(queue.try_pop(), None);
}

#[test]
fn test_push_beyond_capacity() {
    let queue = open_queue(2);
    queue.push(frame(1, b"")).unwrap();
    queue.push(frame(2, b"")).unwrap();

    match queue.push(frame(3, b"")) {
        Err(SkirmishError::ResourceExhausted(Resource::SessionQueue)) => {}
        other => panic!("Expected exhausted queue, got {:?}", other),
    }
    assert_eq!(queue.len(), 2);
}

#[test]
fn test_pop_timeout_on_empty_queue() {
    let queue = open_queue(2);
    assert_eq!(queue.pop_timeout(Duration::from_millis(20)).unwrap(), None);
}

#[test]
fn test_pop_timeout_keeps_its_deadline_across_wakeups() {
    let queue = Arc::new(open_queue(4));
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let start = Instant::now();
            let _ = queue.pop_timeout(Duration::from_millis(100));
            start.elapsed()
        })
    };

    // Wake the consumer repeatedly but take the message back each time
    for _ in 0..12 {
        thread::sleep(Duration::from_millis(30));
        queue.push(frame(1, b"stolen")).unwrap();
        queue.try_pop();
    }

    let waited = consumer.join().unwrap();
    assert!(waited < Duration::from_millis(300), "waited {:?}", waited);
}

#[test]
fn test_push_close_ignores_capacity() {
    let queue = open_queue(1);
    queue.push(frame(1, b"")).unwrap();
    assert!(queue.push(Inbound::Close).is_err());

    queue.push_close().unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(message_type(&queue.pop().unwrap()), 1);
    assert_eq!(queue.pop().unwrap(), Inbound::Close);

    queue.close();
    assert!(matches!(queue.push_close(), Err(SkirmishError::SessionClosed(0))));
}

#[test]
fn test_close_drops_pending_and_rejects_pushes() {
    let queue = open_queue(4);
    queue.push(frame(1, b"x")).unwrap();
    queue.close();

    assert!(queue.is_empty());
    assert!(matches!(queue.pop(), Err(SkirmishError::SessionClosed(0))));
    assert!(queue.push(frame(2, b"y")).is_err());
}

#[test]
fn test_reopen_discards_previous_connection() {
    let queue = open_queue(4);
    queue.push(frame(1, b"old")).unwrap();
    queue.reopen();

    assert!(queue.is_empty());
    queue.push(Inbound::Open).unwrap();
    assert_eq!(queue.pop().unwrap(), Inbound::Open);
}

#[test]
fn test_blocking_pop_woken_by_push() {
    let queue = Arc::new(open_queue(4));
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    thread::sleep(Duration::from_millis(30));
    queue.push(frame(9, b"late")).unwrap();

    let inbound = consumer.join().unwrap().unwrap();
    assert_eq!(message_type(&inbound), 9);
}

#[test]
fn test_blocking_pop_woken_by_close() {
    let queue = Arc::new(open_queue(4));
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    thread::sleep(Duration::from_millis(30));
    queue.close();

    assert!(consumer.join().unwrap().is_err());
}

#[test]
fn test_concurrent_producers_keep_their_order() {
    const PRODUCERS: i32 = 4;
    const PER_PRODUCER: i32 = 200;

    let queue = Arc::new(open_queue((PRODUCERS * PER_PRODUCER) as usize));
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for seq in 0..PER_PRODUCER {
                    queue.push(frame(producer * 1000 + seq, b"")).unwrap();
                    if rng.gen_ratio(1, 8) {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut last_seen = vec![-1; PRODUCERS as usize];
    let mut total = 0;
    while let Some(inbound) = queue.try_pop() {
        let tag = message_type(&inbound);
        let (producer, seq) = ((tag / 1000) as usize, tag % 1000);
        assert!(seq > last_seen[producer], "producer {} reordered", producer);
        last_seen[producer] = seq;
        total += 1;
    }
    assert_eq!(total, PRODUCERS * PER_PRODUCER);
}

// =============================================================================
// Table Tests
// =============================================================================

#[test]
fn test_table_lookup_bounds() {
    let table = SessionTable::new(4, 8);
    assert_eq!(table.len(), 4);
    assert!(table.is_valid_id(3));
    assert!(!table.is_valid_id(4));
    assert!(matches!(table.get(4), Err(SkirmishError::SessionNotFound(4))));
}

#[test]
fn test_fresh_session_state() {
    let table = SessionTable::new(2, 8);
    let session = table.get(1).unwrap();

    assert_eq!(session.id(), 1);
    assert_eq!(session.status(), SessionStatus::Closed);
    assert_eq!(session.quick_match_status(), QuickMatchStatus::NotWaiting);
    assert_eq!(session.pending_messages(), 0);
    assert!(session.snapshot().account().is_none());
    assert!(session.snapshot().match_id().is_none());
}

#[test]
fn test_session_queue_is_closed_until_opened() {
    let table = SessionTable::new(1, 8);
    let session = table.get(0).unwrap();
    assert!(session.push_message(Inbound::Open).is_err());
    assert!(session.try_pop_message().is_none());
}
