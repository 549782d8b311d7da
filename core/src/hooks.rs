//! Host fault hooks: panic interception.
//!
//! The process-wide panic hook is installed once and chained in front of
//! whatever hook was already set. It holds only a weak reference to the
//! engine: repeated installation retargets the weak instead of stacking
//! hooks, detaching clears it, and a dropped engine turns the hook into
//! a pass-through.

use crate::engine::{Blurt, BlurtInner};
use crate::fault::Fault;
use std::sync::{LazyLock, Mutex, Weak};
use tracing::debug;

struct HookState {
    target: Option<Weak<BlurtInner>>,
    installed: bool,
}

static HOOK_STATE: LazyLock<Mutex<HookState>> = LazyLock::new(|| {
    Mutex::new(HookState {
        target: None,
        installed: false,
    })
});

/// Points the process panic hook at `engine`. Idempotent: a second call
/// replaces the target, never the hook chain.
pub fn install(engine: &Blurt) {
    let Ok(mut state) = HOOK_STATE.lock() else {
        return;
    };
    state.target = Some(engine.inner_weak());
    if state.installed {
        return;
    }
    state.installed = true;
    drop(state);

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        previous(info);
        // try_lock: a panic raised under this lock must not deadlock the
        // panicking thread.
        let target = HOOK_STATE
            .try_lock()
            .ok()
            .and_then(|state| state.target.clone());
        if let Some(inner) = target.and_then(|weak| weak.upgrade()) {
            inner.handle_fault(&Fault::from_panic(info));
        }
    }));
    debug!(target = "blurt", "panic hook installed");
}

/// Clears the hook target. The chained hook stays in place as a
/// pass-through; the engine is no longer reachable from it.
pub fn detach() {
    if let Ok(mut state) = HOOK_STATE.lock() {
        state.target = None;
    }
}
