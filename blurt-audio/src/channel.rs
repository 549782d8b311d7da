//! Channel-backed sink for hosts that own their own speech queue.
//!
//! `deliver` completes once the host queue accepts the utterance; actual
//! rendering is the host's business. A bounded channel gives natural
//! backpressure when the host falls behind. Cancellation bumps a watch
//! generation the host can observe to flush whatever it has queued.

use async_trait::async_trait;
use blurt_core::{SpeakParams, SpeechSink};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::SinkError;

/// One utterance as handed to the host.
#[derive(Clone, Debug, PartialEq)]
pub struct SpokenUtterance {
    pub text: String,
    pub params: SpeakParams,
}

pub struct ChannelSink {
    tx: mpsc::Sender<SpokenUtterance>,
    cancel_tx: watch::Sender<u64>,
    cancel_rx: watch::Receiver<u64>,
}

impl ChannelSink {
    /// Builds the sink and the receiving end the host drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SpokenUtterance>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (cancel_tx, cancel_rx) = watch::channel(0);
        (
            Self {
                tx,
                cancel_tx,
                cancel_rx,
            },
            rx,
        )
    }

    /// A watch the host can select on; the value increments on every
    /// cancellation.
    pub fn cancel_signal(&self) -> watch::Receiver<u64> {
        self.cancel_rx.clone()
    }
}

#[async_trait]
impl SpeechSink for ChannelSink {
    async fn deliver(&self, text: &str, params: &SpeakParams) -> blurt_core::Result<()> {
        self.tx
            .send(SpokenUtterance {
                text: text.to_string(),
                params: params.clone(),
            })
            .await
            .map_err(|_| SinkError::ChannelClosed.into())
    }

    fn cancel(&self) {
        self.cancel_tx.send_modify(|generation| *generation += 1);
        debug!(target = "tts", "host speech queue flush requested");
    }

    fn list_voices(&self) -> Vec<String> {
        // Voice inventory lives host-side.
        Vec::new()
    }

    fn is_ready(&self) -> bool {
        !self.tx.is_closed()
    }
}
