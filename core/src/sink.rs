//! The speech sink seam: one utterance in, one completion out.

use crate::config::NarratorConfig;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Prosody and voice selection handed to the sink with each utterance.
/// Sinks that lack a control simply ignore it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeakParams {
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl SpeakParams {
    pub fn from_config(config: &NarratorConfig) -> Self {
        SpeakParams {
            voice: config.voice.clone(),
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume,
        }
    }
}

impl Default for SpeakParams {
    fn default() -> Self {
        SpeakParams {
            voice: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// A backend that renders one utterance at a time.
///
/// The queue guarantees at most one outstanding `deliver` call; the future
/// resolving is the completion signal and must resolve exactly once,
/// success or failure. Implementations running work on other OS threads
/// marshal completion back themselves (the returned future simply resolves
/// there). A sink must never call back into the engine synchronously from
/// its completion path; if delivery itself produces a fault, report it
/// from a freshly spawned task.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    /// Render `text`. Resolves when the backend is done with the
    /// utterance, whether or not audio was actually produced.
    async fn deliver(&self, text: &str, params: &SpeakParams) -> Result<()>;

    /// Best-effort abort of the in-flight utterance, if any.
    fn cancel(&self);

    /// Enumerates voice identifiers the backend can render with.
    /// Best-effort; may block briefly on process sinks.
    fn list_voices(&self) -> Vec<String>;

    /// Whether delivery is currently worth attempting. Admission still
    /// happens while false; delivery is skipped.
    fn is_ready(&self) -> bool {
        true
    }
}

/// A sink with no backend. Reports not-ready, so the queue records
/// admissions but skips delivery; useful for hosts that wire audio up
/// later or not at all.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl SpeechSink for NullSink {
    async fn deliver(&self, text: &str, _params: &SpeakParams) -> Result<()> {
        debug!(target = "blurt", text, "null sink swallowed utterance");
        Ok(())
    }

    fn cancel(&self) {}

    fn list_voices(&self) -> Vec<String> {
        Vec::new()
    }

    fn is_ready(&self) -> bool {
        false
    }
}
