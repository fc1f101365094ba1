//! Cross-instance guard: at most one engine may run per page context in a
//! process. The host can load the engine more than once (loader plus
//! individually installed variants); duplicates double-sample and corrupt
//! totals, so later arrivals must decline to initialize at all.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

fn registry() -> &'static Mutex<HashSet<String>> {
    static REGISTRY: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

fn lock() -> std::sync::MutexGuard<'static, HashSet<String>> {
    match registry().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Claim the context. Returns false if another instance already holds it,
/// in which case the caller must not register timers or state.
pub fn try_register(context: &str) -> bool {
    lock().insert(context.to_string())
}

/// Release a claim on shutdown so a later launch in the same process can
/// take over.
pub fn release(context: &str) {
    lock().remove(context);
}
