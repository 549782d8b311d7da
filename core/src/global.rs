//! Optional process-global narrator handle.
//!
//! Construction is always explicit: hosts that want free-function
//! shorthands call [`init_global`] during startup and [`shutdown_global`]
//! on the way out. The free functions no-op while no global is installed;
//! nothing is ever constructed lazily.

use crate::config::NarratorConfig;
use crate::engine::Blurt;
use crate::fault::Fault;
use crate::sink::SpeechSink;
use std::sync::{Arc, RwLock};

static GLOBAL: RwLock<Option<Blurt>> = RwLock::new(None);

/// Installs a process-global narrator, shutting down any previous one.
/// Returns a handle to the new engine.
pub fn init_global(config: NarratorConfig, sink: Arc<dyn SpeechSink>) -> Blurt {
    let engine = Blurt::new(config, sink);
    let previous = GLOBAL.write().unwrap().replace(engine.clone());
    if let Some(old) = previous {
        old.shutdown();
    }
    engine
}

/// Shuts down and removes the global narrator, if any.
pub fn shutdown_global() {
    if let Some(engine) = GLOBAL.write().unwrap().take() {
        engine.shutdown();
    }
}

/// The current global narrator, if one is installed.
pub fn global() -> Option<Blurt> {
    GLOBAL.read().unwrap().clone()
}

/// Forwards a fault to the global narrator; no-op when uninstalled.
pub fn narrate(fault: &Fault) {
    if let Some(engine) = global() {
        engine.handle_fault(fault);
    }
}

/// Speaks pre-humanized text through the global narrator; no-op when
/// uninstalled.
pub fn speak(text: &str) {
    if let Some(engine) = global() {
        engine.speak(text);
    }
}
