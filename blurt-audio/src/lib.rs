//! Speech sink adapters for the blurt error narrator
//!
//! Two concrete [`blurt_core::SpeechSink`] implementations:
//! - [`CommandSink`]: local OS speech commands with graceful degradation
//!   (prefer espeak-ng, fall back to macOS `say`; if neither is present
//!   the sink constructs but reports not-ready)
//! - [`ChannelSink`]: hands utterances to a host-owned queueing speech
//!   API over a bounded channel
//!
//! Env overrides for the command sink:
//! - BLURT_ESPEAK_BIN, BLURT_SAY_BIN
//! - BLURT_TTS_TIMEOUT_MS

mod channel;
mod command;

pub use channel::{ChannelSink, SpokenUtterance};
pub use command::{CommandSink, CommandSinkConfig};

use blurt_core::BlurtError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Speech command failed: {0}")]
    Engine(String),

    #[error("Speech command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Host speech channel closed")]
    ChannelClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SinkError> for BlurtError {
    fn from(e: SinkError) -> Self {
        match e {
            SinkError::Io(io) => BlurtError::Io(io),
            other => BlurtError::Sink(other.to_string()),
        }
    }
}
