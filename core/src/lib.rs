// Blurt Core Library
// Spoken error narration engine: fault in, short sentence out loud

pub mod classify;
pub mod config;
mod engine;
pub mod fault;
pub mod global;
pub mod hooks;
pub mod humanize;
pub mod policy;
mod queue;
pub mod sink;

// Export core types
pub use classify::{Classification, Severity, ALWAYS_IGNORE};
pub use config::{ConfigPatch, FilterConfig, NarratorConfig};
pub use engine::{Blurt, FaultReporter, Status};
pub use fault::{Fault, FaultKind};
pub use humanize::{Matcher, Rule, RuleMatch, RuleSet};
pub use policy::{DropReason, PolicyLedger, Verdict};
pub use queue::{QueueStats, Utterance};
pub use sink::{NullSink, SpeakParams, SpeechSink};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlurtError {
    #[error("Humanization error: {0}")]
    Humanize(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Hook error: {0}")]
    Hook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BlurtError>;
