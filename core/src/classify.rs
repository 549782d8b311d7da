//! Fault classification: kind, severity and the stable rate-limit key.

use crate::fault::{Fault, FaultKind};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// How loudly a consumer should care about a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Normal,
}

/// The classification attached to every utterance.
///
/// `key` is computed from the *final* spoken text, not the raw message, so
/// two faults that humanize to the same sentence share one cooldown entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub kind: FaultKind,
    pub severity: Severity,
    pub key: u64,
}

/// Noise emitted by browsers and bundlers that is never worth narrating.
/// Matching faults are dropped before humanization, regardless of config.
pub const ALWAYS_IGNORE: [&str; 4] = [
    "ResizeObserver loop limit exceeded",
    "Non-Error promise rejection captured with value",
    "Loading chunk",
    "ChunkLoadError",
];

/// Case-insensitive check against [`ALWAYS_IGNORE`].
pub fn always_ignored(message: &str) -> bool {
    let lower = message.to_lowercase();
    ALWAYS_IGNORE
        .iter()
        .any(|pat| lower.contains(&pat.to_lowercase()))
}

/// Derives `(kind, severity)` for a fault. Pure.
pub fn classify(fault: &Fault) -> (FaultKind, Severity) {
    let kind = fault.kind.clone().unwrap_or(FaultKind::Error);
    let message = fault.display_message();
    let lower = message.to_lowercase();

    let severity = if matches!(kind, FaultKind::ReferenceError | FaultKind::SyntaxError)
        || lower.contains("module not found")
        || lower.contains("failed to fetch")
    {
        Severity::Critical
    } else if always_ignored(&message) {
        // Surfaced as a warning for severity-aware consumers, but these
        // never reach the queue.
        Severity::Warning
    } else {
        Severity::Normal
    };

    (kind, severity)
}

/// Deterministic key over the final spoken text and the fault kind, used
/// by the policy ledger for per-error rate limiting. Stable for the
/// lifetime of the process; the ledger is never persisted.
pub fn stable_key(kind: &FaultKind, text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    kind.as_str().hash(&mut hasher);
    text.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_and_syntax_errors_are_critical() {
        let (_, sev) = classify(&Fault::with_kind(FaultKind::ReferenceError, "x is not defined"));
        assert_eq!(sev, Severity::Critical);
        let (_, sev) = classify(&Fault::with_kind(FaultKind::SyntaxError, "Unexpected token )"));
        assert_eq!(sev, Severity::Critical);
    }

    #[test]
    fn critical_messages_match_case_insensitively() {
        let (_, sev) = classify(&Fault::new("MODULE NOT FOUND: ./thing"));
        assert_eq!(sev, Severity::Critical);
        let (_, sev) = classify(&Fault::new("failed to FETCH"));
        assert_eq!(sev, Severity::Critical);
    }

    #[test]
    fn ignored_noise_classifies_as_warning() {
        let (_, sev) = classify(&Fault::new("ResizeObserver loop limit exceeded"));
        assert_eq!(sev, Severity::Warning);
        assert!(always_ignored("loading CHUNK 42 failed"));
        assert!(always_ignored("ChunkLoadError: chunk 3"));
        assert!(!always_ignored("map is not a function"));
    }

    #[test]
    fn missing_kind_defaults_to_error() {
        let (kind, sev) = classify(&Fault::new("something odd"));
        assert_eq!(kind, FaultKind::Error);
        assert_eq!(sev, Severity::Normal);
    }

    #[test]
    fn stable_key_depends_on_kind_and_text() {
        let a = stable_key(&FaultKind::TypeError, "same text");
        let b = stable_key(&FaultKind::TypeError, "same text");
        let c = stable_key(&FaultKind::RangeError, "same text");
        let d = stable_key(&FaultKind::TypeError, "other text");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
