//! The narrator facade: wires classifier, humanizer, policy and queue.

use crate::classify::{self, Classification};
use crate::config::{ConfigPatch, NarratorConfig};
use crate::fault::{Fault, FaultKind};
use crate::hooks;
use crate::humanize::{self, RuleSet};
use crate::policy::{PolicyLedger, Verdict};
use crate::queue::{QueueStats, SpeechQueue, Utterance};
use crate::sink::{SpeakParams, SpeechSink};
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Instant;
use tracing::{debug, info};

/// Snapshot returned by [`Blurt::status`].
#[derive(Clone, Debug, Serialize)]
pub struct Status {
    pub enabled: bool,
    pub sink_ready: bool,
    pub in_flight: bool,
    pub pending: usize,
    pub stats: QueueStats,
    pub config: NarratorConfig,
}

/// Message spoken by [`Blurt::test`] when none is given.
const DEFAULT_TEST_MESSAGE: &str = "Error narration is up and running.";

pub(crate) struct BlurtInner {
    config: RwLock<Arc<NarratorConfig>>,
    ledger: Mutex<PolicyLedger>,
    rules: RuleSet,
    queue: SpeechQueue,
    sink: Arc<dyn SpeechSink>,
}

/// The error narrator.
///
/// A cheap handle over shared engine state: clones address the same
/// engine. Construction spawns the delivery worker, so it must happen
/// within a tokio runtime; every operation after that is synchronous,
/// non-blocking and callable from any thread. No operation ever returns
/// an error to the caller: the narrator is a best-effort notification
/// channel and must never become a fault source in its host.
#[derive(Clone)]
pub struct Blurt {
    inner: Arc<BlurtInner>,
}

impl Blurt {
    /// Builds an engine with the built-in humanization rules.
    pub fn new(config: NarratorConfig, sink: Arc<dyn SpeechSink>) -> Self {
        Blurt::with_rules(config, sink, RuleSet::builtin())
    }

    /// Builds an engine with a caller-assembled rule table.
    pub fn with_rules(
        config: NarratorConfig,
        sink: Arc<dyn SpeechSink>,
        rules: RuleSet,
    ) -> Self {
        let auto_hook = config.auto_hook;
        let engine = Blurt {
            inner: Arc::new(BlurtInner {
                config: RwLock::new(Arc::new(config)),
                ledger: Mutex::new(PolicyLedger::new()),
                rules,
                queue: SpeechQueue::new(Arc::clone(&sink)),
                sink,
            }),
        };
        if auto_hook {
            hooks::install(&engine);
        }
        info!(target = "blurt", "narrator constructed");
        engine
    }

    /// Classifies, humanizes and, policy permitting, enqueues a fault.
    /// Synchronous and non-blocking; never errors.
    pub fn handle_fault(&self, fault: &Fault) {
        self.inner.handle_fault(fault);
    }

    /// Speaks pre-humanized text. Bypasses the classifier and humanizer
    /// but remains subject to the admission policy.
    pub fn speak(&self, text: &str) {
        self.inner.speak(text);
    }

    /// Smoke-tests the sink with `message`, or a stock sentence.
    pub fn test(&self, message: Option<&str>) {
        self.inner.speak(message.unwrap_or(DEFAULT_TEST_MESSAGE));
    }

    pub fn enable(&self) {
        self.inner.set_enabled(true);
    }

    /// Disables narration and cancels everything queued or in flight.
    pub fn disable(&self) {
        self.inner.set_enabled(false);
        self.inner.queue.cancel();
    }

    /// Cancels pending and in-flight utterances. The ledger is untouched.
    pub fn clear_queue(&self) {
        self.inner.queue.cancel();
    }

    /// Merges a partial config and replaces the snapshot atomically.
    /// In-flight and pending utterances are not re-evaluated.
    pub fn update_config(&self, patch: ConfigPatch) {
        let mut slot = self.inner.config.write().unwrap();
        let mut config = (**slot).clone();
        patch.apply(&mut config);
        *slot = Arc::new(config);
        debug!(target = "blurt", "config updated");
    }

    pub fn status(&self) -> Status {
        let config = self.inner.config_snapshot();
        let (in_flight, pending) = self.inner.queue.snapshot();
        Status {
            enabled: config.enabled,
            sink_ready: self.inner.sink.is_ready(),
            in_flight,
            pending,
            stats: self.inner.queue.stats(),
            config: (*config).clone(),
        }
    }

    /// A weak, clonable handle for host fault sources (panic hooks, task
    /// join watchers, error channels). Reports no-op once the engine is
    /// gone.
    pub fn reporter(&self) -> FaultReporter {
        FaultReporter {
            target: Arc::downgrade(&self.inner),
        }
    }

    /// Detaches the panic hook target and stops the delivery worker.
    pub fn shutdown(&self) {
        hooks::detach();
        self.inner.queue.shutdown();
        info!(target = "blurt", "narrator shut down");
    }

    pub(crate) fn inner_weak(&self) -> Weak<BlurtInner> {
        Arc::downgrade(&self.inner)
    }
}

impl BlurtInner {
    pub(crate) fn config_snapshot(&self) -> Arc<NarratorConfig> {
        Arc::clone(&self.config.read().unwrap())
    }

    fn set_enabled(&self, enabled: bool) {
        let mut slot = self.config.write().unwrap();
        if slot.enabled == enabled {
            return;
        }
        let mut config = (**slot).clone();
        config.enabled = enabled;
        *slot = Arc::new(config);
        info!(target = "blurt", enabled, "narration toggled");
    }

    pub(crate) fn handle_fault(&self, fault: &Fault) {
        let config = self.config_snapshot();
        if !config.enabled {
            return;
        }

        let raw = fault.display_message();
        if classify::always_ignored(&raw) {
            debug!(target = "blurt", message = %raw, "unconditionally ignored fault");
            return;
        }

        let (kind, severity) = classify::classify(fault);
        let text = if config.humanize {
            match self.rules.humanize(fault, &config) {
                Ok(text) => text,
                Err(e) => {
                    debug!(target = "blurt", error = %e, "humanization failed");
                    if !config.fallback_to_raw {
                        return;
                    }
                    humanize::truncate(&humanize::clean_message(&raw), config.max_message_length)
                }
            }
        } else {
            humanize::truncate(&humanize::clean_message(&raw), config.max_message_length)
        };
        if text.is_empty() {
            return;
        }
        // The final sentence can hit an ignore pattern the raw message
        // missed; admission must not depend on which form matched.
        if classify::always_ignored(&text) {
            debug!(target = "blurt", text = %text, "unconditionally ignored utterance");
            return;
        }

        let key = classify::stable_key(&kind, &text);
        self.admit_and_enqueue(
            text,
            Classification {
                kind,
                severity,
                key,
            },
            &config,
        );
    }

    pub(crate) fn speak(&self, text: &str) {
        let config = self.config_snapshot();
        if !config.enabled {
            return;
        }
        let text = humanize::truncate(
            &humanize::normalize_spoken(text),
            config.max_message_length,
        );
        if text.is_empty() {
            return;
        }
        if classify::always_ignored(&text) {
            return;
        }
        let kind = FaultKind::Error;
        let key = classify::stable_key(&kind, &text);
        self.admit_and_enqueue(
            text,
            Classification {
                kind,
                severity: crate::classify::Severity::Normal,
                key,
            },
            &config,
        );
    }

    fn admit_and_enqueue(&self, text: String, classification: Classification, config: &NarratorConfig) {
        let now = Instant::now();
        let duplicate = self.queue.contains_text(&text);
        let verdict = self.ledger.lock().unwrap().admit(
            &text,
            &classification.kind,
            classification.key,
            now,
            duplicate,
            config,
        );
        match verdict {
            Verdict::Admit => {
                debug!(
                    target = "blurt",
                    text = %text,
                    severity = ?classification.severity,
                    "utterance admitted"
                );
                self.queue.enqueue(Utterance {
                    text,
                    classification,
                    params: SpeakParams::from_config(config),
                    admitted_at: now,
                });
            }
            Verdict::Drop(reason) => {
                if config.debug {
                    debug!(
                        target = "blurt",
                        text = %text,
                        reason = reason.as_str(),
                        "utterance dropped"
                    );
                }
            }
        }
    }
}

/// Weak fault-reporting handle; see [`Blurt::reporter`].
#[derive(Clone)]
pub struct FaultReporter {
    target: Weak<BlurtInner>,
}

impl FaultReporter {
    /// Forwards a fault to the engine, if it is still alive.
    pub fn report(&self, fault: &Fault) {
        if let Some(inner) = self.target.upgrade() {
            inner.handle_fault(fault);
        }
    }
}
