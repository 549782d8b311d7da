//! Single-consumer utterance queue: strict FIFO, at most one in flight.
//!
//! Admitted utterances wait here until the worker hands them to the sink
//! one at a time. Completion is the sink's `deliver` future resolving; a
//! short settle delay separates adjacent utterances so backends do not
//! run sentences together. Cancellation bumps a generation counter, so a
//! completion that resolves afterwards neither clears state nor
//! dispatches a successor.

use crate::classify::Classification;
use crate::sink::{SpeakParams, SpeechSink};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Fixed pause between utterances.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// A policy-admitted utterance on its way to the sink.
#[derive(Clone, Debug)]
pub struct Utterance {
    pub text: String,
    pub classification: Classification,
    pub params: SpeakParams,
    pub admitted_at: Instant,
}

/// Delivery counters, in the shape of the engine status report.
#[derive(Clone, Debug, Default, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub failed: u64,
    pub skipped: u64,
    pub cancelled: u64,
}

struct QueueState {
    pending: VecDeque<Utterance>,
    in_flight: Option<String>,
    generation: u64,
    shutdown: bool,
    stats: QueueStats,
}

struct Shared {
    state: Mutex<QueueState>,
    notify: Notify,
    sink: Arc<dyn SpeechSink>,
}

pub(crate) struct SpeechQueue {
    shared: Arc<Shared>,
}

impl SpeechQueue {
    /// Spawns the delivery worker. Must be called within a tokio runtime.
    pub(crate) fn new(sink: Arc<dyn SpeechSink>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                in_flight: None,
                generation: 0,
                shutdown: false,
                stats: QueueStats::default(),
            }),
            notify: Notify::new(),
            sink,
        });
        tokio::spawn(run_worker(Arc::clone(&shared)));
        SpeechQueue { shared }
    }

    /// O(1), non-blocking. Callable from any thread.
    pub(crate) fn enqueue(&self, utterance: Utterance) {
        {
            let mut state = self.shared.state.lock().unwrap();
            if state.shutdown {
                return;
            }
            state.stats.enqueued += 1;
            state.pending.push_back(utterance);
        }
        self.shared.notify.notify_one();
    }

    /// Drops all pending utterances and aborts the in-flight one.
    pub(crate) fn cancel(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            let dropped = state.pending.len() as u64 + state.in_flight.is_some() as u64;
            state.stats.cancelled += dropped;
            state.pending.clear();
            state.in_flight = None;
            state.generation += 1;
        }
        self.shared.sink.cancel();
        self.shared.notify.notify_one();
    }

    /// Whether `text` is already pending or in flight.
    pub(crate) fn contains_text(&self, text: &str) -> bool {
        let state = self.shared.state.lock().unwrap();
        state.in_flight.as_deref() == Some(text)
            || state.pending.iter().any(|u| u.text == text)
    }

    /// `(in_flight, pending)` at this instant.
    pub(crate) fn snapshot(&self) -> (bool, usize) {
        let state = self.shared.state.lock().unwrap();
        (state.in_flight.is_some(), state.pending.len())
    }

    pub(crate) fn stats(&self) -> QueueStats {
        self.shared.state.lock().unwrap().stats.clone()
    }

    /// Stops the worker permanently. Idempotent.
    pub(crate) fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.shutdown = true;
            state.pending.clear();
            state.in_flight = None;
            state.generation += 1;
        }
        self.shared.sink.cancel();
        self.shared.notify.notify_one();
    }
}

impl Drop for SpeechQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_worker(shared: Arc<Shared>) {
    loop {
        let next = {
            let mut state = shared.state.lock().unwrap();
            if state.shutdown {
                break;
            }
            match state.pending.pop_front() {
                Some(utterance) => {
                    state.in_flight = Some(utterance.text.clone());
                    Some((utterance, state.generation))
                }
                None => None,
            }
        };

        let Some((utterance, generation)) = next else {
            shared.notify.notified().await;
            continue;
        };

        if !shared.sink.is_ready() {
            debug!(
                target = "blurt",
                text = %utterance.text,
                "sink not ready; utterance dropped after admission"
            );
            let mut state = shared.state.lock().unwrap();
            if state.generation == generation {
                state.in_flight = None;
            }
            state.stats.skipped += 1;
            continue;
        }

        let result = shared.sink.deliver(&utterance.text, &utterance.params).await;

        {
            let mut state = shared.state.lock().unwrap();
            if state.generation != generation {
                // Cancelled while in flight: state was already cleared and
                // the successor must not be dispatched from this path.
                continue;
            }
            state.in_flight = None;
            match &result {
                Ok(()) => state.stats.delivered += 1,
                Err(e) => {
                    state.stats.failed += 1;
                    warn!(target = "blurt", error = %e, "sink delivery failed");
                }
            }
        }

        tokio::time::sleep(SETTLE_DELAY).await;
    }
    debug!(target = "blurt", "speech queue worker stopped");
}
