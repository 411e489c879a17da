//! Integration tests for the thread-pool runtime
//!
//! TigerStyle: Verify the mailbox guarantees under real parallelism:
//!
//! - Messages to one actor are processed in order, never concurrently
//! - Different actors make progress independently
//! - Sends beyond the permit pool fail fast and recover after draining
//! - Nothing is admitted after stop or release

use shoal_core::config::RuntimeConfig;
use shoal_core::error::{Error, Result};
use shoal_runtime::{Actor, ActorContext, ActorRef, ActorsRuntime, SimpleActorsRuntime};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::Duration;
use tokio::sync::mpsc;

const PAUSE: u32 = u32::MAX;
const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Test Actor
// =============================================================================

/// Reports every processed message and detects overlapping turns
struct Probe {
    label: u32,
    events: mpsc::UnboundedSender<(u32, u32)>,
    in_flight: AtomicUsize,
    overlaps: Arc<AtomicUsize>,
    gate: Option<std_mpsc::Receiver<()>>,
}

impl Actor for Probe {
    type Message = u32;

    fn process_message(&mut self, _ctx: &ActorContext<'_, u32>, message: u32) -> Result<bool> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        if message == PAUSE {
            if let Some(gate) = &self.gate {
                let _ = gate.recv_timeout(WAIT);
            }
        } else {
            std::thread::yield_now();
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let _ = self.events.send((self.label, message));
        Ok(true)
    }
}

// =============================================================================
// Test Helpers
// =============================================================================

struct Harness {
    runtime: SimpleActorsRuntime,
    events: mpsc::UnboundedReceiver<(u32, u32)>,
    events_tx: mpsc::UnboundedSender<(u32, u32)>,
    overlaps: Arc<AtomicUsize>,
}

impl Harness {
    fn new(max_messages: usize) -> Self {
        let runtime = SimpleActorsRuntime::executor(RuntimeConfig {
            max_messages,
            shutdown_wait_time_ms: 2000,
        })
        .unwrap();
        runtime.start().unwrap();

        let (events_tx, events) = mpsc::unbounded_channel();
        Self {
            runtime,
            events,
            events_tx,
            overlaps: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn spawn(&self, label: u32, gate: Option<std_mpsc::Receiver<()>>) -> ActorRef<u32> {
        self.runtime
            .get_support_for(Probe {
                label,
                events: self.events_tx.clone(),
                in_flight: AtomicUsize::new(0),
                overlaps: self.overlaps.clone(),
                gate,
            })
            .unwrap()
    }

    async fn next_event(&mut self) -> (u32, u32) {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for actor")
            .expect("event channel closed")
    }

    async fn collect(&mut self, count: usize) -> Vec<(u32, u32)> {
        let mut events = Vec::with_capacity(count);
        for _ in 0..count {
            events.push(self.next_event().await);
        }
        events
    }

    async fn wait_until_drained(&self) {
        tokio::time::timeout(WAIT, async {
            while self.runtime.pending_messages() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("permits were not returned");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_serial_processing_keeps_fifo_order() {
    let mut harness = Harness::new(1024);
    let actor = harness.spawn(1, None);

    for i in 0..200 {
        actor.send_message(i).unwrap();
    }

    let received: Vec<u32> = harness.collect(200).await.into_iter().map(|(_, m)| m).collect();
    assert_eq!(received, (0..200).collect::<Vec<_>>());
    assert_eq!(harness.overlaps.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_senders_never_overlap() {
    let mut harness = Harness::new(4096);
    let actor = harness.spawn(1, None);

    let senders: Vec<_> = (0..4u32)
        .map(|sender| {
            let actor = actor.clone();
            tokio::task::spawn_blocking(move || {
                for i in 0..100 {
                    actor.send_message(sender * 1000 + i).unwrap();
                }
            })
        })
        .collect();
    for sender in senders {
        sender.await.unwrap();
    }

    let received = harness.collect(400).await;
    assert_eq!(harness.overlaps.load(Ordering::SeqCst), 0);

    // Each sender's messages arrive in the order it sent them
    for sender in 0..4u32 {
        let sequence: Vec<u32> = received
            .iter()
            .map(|(_, m)| *m)
            .filter(|m| m / 1000 == sender)
            .collect();
        let expected: Vec<u32> = (0..100).map(|i| sender * 1000 + i).collect();
        assert_eq!(sequence, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_actors_progress_in_parallel() {
    let mut harness = Harness::new(64);
    let (gate_tx, gate_rx) = std_mpsc::channel();
    let paused = harness.spawn(1, Some(gate_rx));
    let free = harness.spawn(2, None);

    paused.send_message(PAUSE).unwrap();
    free.send_message(7).unwrap();

    // The second actor completes while the first one is still blocked
    assert_eq!(harness.next_event().await, (2, 7));

    gate_tx.send(()).unwrap();
    assert_eq!(harness.next_event().await, (1, PAUSE));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_messages_over_limit_rejected() {
    let mut harness = Harness::new(16);
    let (gate_tx, gate_rx) = std_mpsc::channel();
    let paused = harness.spawn(1, Some(gate_rx));
    let other = harness.spawn(2, None);

    paused.send_message(PAUSE).unwrap();
    for i in 0..15 {
        paused.send_message(i).unwrap();
    }
    assert_eq!(harness.runtime.pending_messages(), 16);

    let err = other.send_message(100).unwrap_err();
    assert!(matches!(err, Error::TooManyPendingMessages { max_messages: 16 }));
    let err = paused.send_message(100).unwrap_err();
    assert!(err.is_retriable());

    gate_tx.send(()).unwrap();
    let received = harness.collect(16).await;
    assert_eq!(received[0], (1, PAUSE));
    harness.wait_until_drained().await;

    other.send_message(100).unwrap();
    assert_eq!(harness.next_event().await, (2, 100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_messages_after_stop() {
    let mut harness = Harness::new(64);
    let actor = harness.spawn(1, None);

    actor.send_message(1).unwrap();
    assert_eq!(harness.next_event().await, (1, 1));

    assert!(harness.runtime.stop().await);
    assert!(matches!(actor.send_message(2), Err(Error::RuntimeClosed)));
    let late = harness.runtime.get_support_for(Probe {
        label: 3,
        events: harness.events_tx.clone(),
        in_flight: AtomicUsize::new(0),
        overlaps: harness.overlaps.clone(),
        gate: None,
    });
    assert!(matches!(late, Err(Error::RuntimeClosed)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_messages_after_release() {
    let mut harness = Harness::new(64);
    let actor = harness.spawn(1, None);

    actor.send_message(1).unwrap();
    assert_eq!(harness.next_event().await, (1, 1));
    harness.wait_until_drained().await;

    // The drain step clears its running flag just after returning the permit
    tokio::time::timeout(WAIT, async {
        while !actor.release_if_idle() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("mailbox never became idle");

    assert!(actor.is_released());
    assert!(matches!(actor.send_message(2), Err(Error::ActorRefReleased)));
    assert_eq!(harness.runtime.pending_messages(), 0);
}
