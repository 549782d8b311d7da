//! Engine configuration: an immutable snapshot, replaced atomically.

use serde::{Deserialize, Serialize};

/// Allow/deny filtering applied by the admission policy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Case-insensitive substrings; any match drops the utterance.
    pub ignore_patterns: Vec<String>,
    /// When non-empty, at least one case-insensitive substring must match.
    pub only_patterns: Vec<String>,
    /// When non-empty, the fault kind must be a member (by tag name).
    pub error_kinds: Vec<String>,
}

/// Narrator configuration. Held by the engine as an immutable snapshot and
/// replaced wholesale on update; unknown fields in serialized form are
/// ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    /// Master gate. When false, `handle_fault` short-circuits.
    pub enabled: bool,
    /// Preferred voice name or language tag. Advisory; sinks may ignore it.
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// Hard upper bound on utterance length, in code points.
    pub max_message_length: usize,
    /// Base cooldown window for both the global and per-key gates.
    pub cooldown_ms: u64,
    /// When false, the humanizer is skipped and the cleaned raw message
    /// is spoken instead.
    pub humanize: bool,
    /// When humanization fails, speak the cleaned raw message rather than
    /// dropping the fault.
    pub fallback_to_raw: bool,
    /// Append `in <file> at line <n>` from the stack's top frame when no
    /// rule matched.
    pub include_location: bool,
    pub filters: FilterConfig,
    /// Emit per-drop diagnostics at debug level.
    pub debug: bool,
    /// Install the process panic hook at construction.
    pub auto_hook: bool,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        NarratorConfig {
            enabled: true,
            voice: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            max_message_length: 200,
            cooldown_ms: 5_000,
            humanize: true,
            fallback_to_raw: true,
            include_location: true,
            filters: FilterConfig::default(),
            debug: false,
            auto_hook: false,
        }
    }
}

/// Partial update merged into the current snapshot by
/// [`crate::Blurt::update_config`]. Absent fields keep their value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub enabled: Option<bool>,
    pub voice: Option<Option<String>>,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
    pub max_message_length: Option<usize>,
    pub cooldown_ms: Option<u64>,
    pub humanize: Option<bool>,
    pub fallback_to_raw: Option<bool>,
    pub include_location: Option<bool>,
    pub ignore_patterns: Option<Vec<String>>,
    pub only_patterns: Option<Vec<String>>,
    pub error_kinds: Option<Vec<String>>,
    pub debug: Option<bool>,
}

impl ConfigPatch {
    pub fn apply(&self, config: &mut NarratorConfig) {
        if let Some(v) = self.enabled {
            config.enabled = v;
        }
        if let Some(v) = &self.voice {
            config.voice = v.clone();
        }
        if let Some(v) = self.rate {
            config.rate = v;
        }
        if let Some(v) = self.pitch {
            config.pitch = v;
        }
        if let Some(v) = self.volume {
            config.volume = v;
        }
        if let Some(v) = self.max_message_length {
            config.max_message_length = v;
        }
        if let Some(v) = self.cooldown_ms {
            config.cooldown_ms = v;
        }
        if let Some(v) = self.humanize {
            config.humanize = v;
        }
        if let Some(v) = self.fallback_to_raw {
            config.fallback_to_raw = v;
        }
        if let Some(v) = self.include_location {
            config.include_location = v;
        }
        if let Some(v) = &self.ignore_patterns {
            config.filters.ignore_patterns = v.clone();
        }
        if let Some(v) = &self.only_patterns {
            config.filters.only_patterns = v.clone();
        }
        if let Some(v) = &self.error_kinds {
            config.filters.error_kinds = v.clone();
        }
        if let Some(v) = self.debug {
            config.debug = v;
        }
    }
}
