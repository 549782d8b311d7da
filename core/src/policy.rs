//! Admission policy: cooldowns, filters and the per-key ledger.
//!
//! Check order is fixed: enabled gate, queue dedup, global cooldown,
//! per-key escalating cooldown, ignore filter, kind filter, allowlist.
//! The ledger is mutated only when an utterance is admitted.

use crate::config::NarratorConfig;
use crate::fault::FaultKind;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Escalation saturates at this multiple of the base cooldown.
const ESCALATION_CAP: u32 = 5;

/// Ledger entries idle for this many base cooldowns are pruned.
const PRUNE_FACTOR: u32 = 10 * ESCALATION_CAP;

/// Why an utterance was not admitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    Disabled,
    DuplicatePending,
    GlobalCooldown,
    KeyCooldown,
    IgnorePattern,
    KindFiltered,
    NotAllowlisted,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Disabled => "disabled",
            DropReason::DuplicatePending => "duplicate_pending",
            DropReason::GlobalCooldown => "global_cooldown",
            DropReason::KeyCooldown => "key_cooldown",
            DropReason::IgnorePattern => "ignore_pattern",
            DropReason::KindFiltered => "kind_filtered",
            DropReason::NotAllowlisted => "not_allowlisted",
        }
    }
}

/// Outcome of an admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Drop(DropReason),
}

#[derive(Clone, Debug)]
struct KeyEntry {
    last_admitted: Instant,
    admit_count: u32,
}

/// Per-key admission bookkeeping. Engine-private, never persisted.
#[derive(Debug, Default)]
pub struct PolicyLedger {
    keys: HashMap<u64, KeyEntry>,
    global_last: Option<Instant>,
}

impl PolicyLedger {
    pub fn new() -> Self {
        PolicyLedger::default()
    }

    /// Number of admissions recorded for `key` so far.
    pub fn admit_count(&self, key: u64) -> u32 {
        self.keys.get(&key).map(|e| e.admit_count).unwrap_or(0)
    }

    /// Decides whether a candidate utterance may be spoken at `now`.
    ///
    /// `pending_duplicate` is the caller's answer to "is this exact text
    /// already in the queue"; the queue owns that state, the policy owns
    /// the ordering of the check. On `Admit` the global timestamp and the
    /// key's entry are updated atomically with the decision; on any drop
    /// the ledger is untouched.
    pub fn admit(
        &mut self,
        text: &str,
        kind: &FaultKind,
        key: u64,
        now: Instant,
        pending_duplicate: bool,
        config: &NarratorConfig,
    ) -> Verdict {
        if !config.enabled {
            return Verdict::Drop(DropReason::Disabled);
        }
        if pending_duplicate {
            return Verdict::Drop(DropReason::DuplicatePending);
        }

        let cooldown = Duration::from_millis(config.cooldown_ms);
        if let Some(global_last) = self.global_last {
            if now.duration_since(global_last) < cooldown {
                return Verdict::Drop(DropReason::GlobalCooldown);
            }
        }
        if let Some(entry) = self.keys.get(&key) {
            let effective = cooldown * entry.admit_count.min(ESCALATION_CAP);
            if now.duration_since(entry.last_admitted) < effective {
                return Verdict::Drop(DropReason::KeyCooldown);
            }
        }

        let lower = text.to_lowercase();
        let filters = &config.filters;
        if filters
            .ignore_patterns
            .iter()
            .any(|p| lower.contains(&p.to_lowercase()))
        {
            return Verdict::Drop(DropReason::IgnorePattern);
        }
        if !filters.error_kinds.is_empty()
            && !filters.error_kinds.iter().any(|k| k == kind.as_str())
        {
            return Verdict::Drop(DropReason::KindFiltered);
        }
        if !filters.only_patterns.is_empty()
            && !filters
                .only_patterns
                .iter()
                .any(|p| lower.contains(&p.to_lowercase()))
        {
            return Verdict::Drop(DropReason::NotAllowlisted);
        }

        self.global_last = Some(now);
        let entry = self.keys.entry(key).or_insert(KeyEntry {
            last_admitted: now,
            admit_count: 0,
        });
        entry.last_admitted = now;
        entry.admit_count = entry.admit_count.saturating_add(1);

        self.prune(now, cooldown);
        Verdict::Admit
    }

    /// Ages out entries idle for longer than `PRUNE_FACTOR` cooldowns.
    fn prune(&mut self, now: Instant, cooldown: Duration) {
        if cooldown.is_zero() {
            return;
        }
        let horizon = cooldown * PRUNE_FACTOR;
        self.keys
            .retain(|_, entry| now.duration_since(entry.last_admitted) <= horizon);
    }
}
