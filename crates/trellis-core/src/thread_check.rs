//! Serial-context verification for Trellis.
//!
//! Collections, diff engines and tree controllers are single-writer: every
//! mutation and notification must happen on one execution context, used
//! consistently. Trellis does not make them internally thread-safe; instead it
//! checks the precondition where it cheaply can.
//!
//! [`SerialAffinity`] binds to the first thread that drives an object and
//! panics if a different thread drives it afterwards. Checks are enabled by
//! default in debug builds only and can be toggled at runtime with
//! [`set_thread_checks_enabled`].
//!
//! ```
//! use trellis_core::thread_check::SerialAffinity;
//!
//! struct Feed {
//!     affinity: SerialAffinity,
//!     value: std::cell::Cell<i32>,
//! }
//!
//! impl Feed {
//!     fn push(&self, v: i32) {
//!         self.affinity.check("Feed::push");
//!         self.value.set(v);
//!     }
//! }
//!
//! let feed = Feed { affinity: SerialAffinity::new(), value: std::cell::Cell::new(0) };
//! feed.push(1);
//! ```

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

/// Flag to enable/disable runtime thread checks globally.
static THREAD_CHECKS_ENABLED: AtomicBool = AtomicBool::new(cfg!(debug_assertions));

/// Enable or disable runtime thread checks.
///
/// By default, thread checks are enabled in debug builds and disabled in
/// release builds.
pub fn set_thread_checks_enabled(enabled: bool) {
    THREAD_CHECKS_ENABLED.store(enabled, Ordering::SeqCst);
}

/// Check if runtime thread checks are currently enabled.
#[inline]
pub fn are_thread_checks_enabled() -> bool {
    THREAD_CHECKS_ENABLED.load(Ordering::Relaxed)
}

/// Records the execution context that drives an object.
///
/// Unlike a creation-time affinity, binding happens on the first
/// [`check`](Self::check) call, so an object may be built on one thread and
/// handed to the serial context that will own it.
#[derive(Debug, Default)]
pub struct SerialAffinity {
    thread_id: OnceLock<ThreadId>,
}

impl SerialAffinity {
    /// Create an unbound affinity.
    pub const fn new() -> Self {
        Self {
            thread_id: OnceLock::new(),
        }
    }

    /// Create an affinity already bound to the current thread.
    pub fn current() -> Self {
        let affinity = Self::new();
        let _ = affinity.thread_id.set(std::thread::current().id());
        affinity
    }

    /// The bound thread, if any call has bound it yet.
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.thread_id.get().copied()
    }

    /// Whether the current thread is the bound one (or nothing is bound yet).
    pub fn is_same_thread(&self) -> bool {
        self.thread_id
            .get()
            .is_none_or(|&id| id == std::thread::current().id())
    }

    /// Bind to the current thread if unbound, otherwise verify it matches.
    ///
    /// Does nothing when thread checks are disabled.
    ///
    /// # Panics
    ///
    /// Panics if checks are enabled and the current thread differs from the
    /// bound one.
    #[inline]
    pub fn check(&self, operation: &str) {
        if !are_thread_checks_enabled() {
            return;
        }
        let current = std::thread::current().id();
        let bound = *self.thread_id.get_or_init(|| current);
        if bound != current {
            panic_wrong_context(operation, bound);
        }
    }
}

#[cold]
#[inline(never)]
fn panic_wrong_context(operation: &str, bound: ThreadId) -> ! {
    let current = std::thread::current();
    let current_name = current.name().unwrap_or("<unnamed>");
    let current_id = current.id();

    tracing::error!(
        target: "trellis_core",
        operation,
        ?bound,
        ?current_id,
        "serial context violation"
    );

    panic!(
        "\n\
        ══════════════════════════════════════════════════════════════════════\n\
        SERIAL CONTEXT VIOLATION\n\
        ══════════════════════════════════════════════════════════════════════\n\
        \n\
        {operation}\n\
        \n\
        Object is driven from thread: {bound:?}\n\
        Current thread: \"{current_name}\" (ID: {current_id:?})\n\
        \n\
        Collections, diff engines and tree controllers must be mutated and\n\
        observed from exactly one serial context.\n\
        \n\
        POSSIBLE SOLUTIONS:\n\
        \n\
        1. Schedule the call on the owning SerialQueue\n\
        2. Feed updates through Debounce/Coalesce bound to that queue\n\
        \n\
        ══════════════════════════════════════════════════════════════════════"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_affinity_binds_on_first_check() {
        let affinity = SerialAffinity::new();
        assert!(affinity.thread_id().is_none());
        assert!(affinity.is_same_thread());

        set_thread_checks_enabled(true);
        affinity.check("first");
        assert_eq!(affinity.thread_id(), Some(std::thread::current().id()));
        affinity.check("second");
    }

    #[test]
    fn test_affinity_current() {
        let affinity = SerialAffinity::current();
        assert_eq!(affinity.thread_id(), Some(std::thread::current().id()));
        assert!(affinity.is_same_thread());
    }

    #[test]
    fn test_affinity_binds_to_other_thread() {
        let affinity = Arc::new(SerialAffinity::new());
        let a = affinity.clone();
        std::thread::spawn(move || {
            set_thread_checks_enabled(true);
            a.check("bind");
        })
        .join()
        .unwrap();

        assert!(!affinity.is_same_thread());
    }

    #[test]
    fn test_affinity_panics_on_wrong_thread() {
        set_thread_checks_enabled(true);
        let affinity = Arc::new(SerialAffinity::current());
        let a = affinity.clone();
        let result = std::thread::spawn(move || {
            a.check("wrong thread");
        })
        .join();

        assert!(result.is_err());
    }
}
