#![forbid(unsafe_code)]

//! Mutation guard: flag state changes not attributable to the owning
//! instance.
//!
//! The guard subscribes to a shared key's record after first render. For each
//! change event it asks one question: is the frame currently on top of the
//! context stack a method of *this* instance? If yes, the mutation is the
//! instance acting on itself and is silently accepted. If no frame is
//! present, or the frame belongs to a different instance, the write came from
//! outside and a [`Violation`] is reported.
//!
//! First assignments (`old = None`) are the initial snapshot landing in the
//! store, not external mutations; they are never reported.
//!
//! Reporting is diagnostic only: the write has already happened and is never
//! rolled back. Because method wrappers defer their frame pops past the
//! settling boundary, every notification triggered synchronously inside a
//! wrapped method observes the correct frame; a mutation arriving from a
//! continuation scheduled beyond that boundary is — deliberately —
//! unattributed and flagged.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use steward_core::{ContextStack, SharedObject, Value};
use steward_reactive::{ReactiveStore, WatchSubscription};

// ─── Metrics counters ────────────────────────────────────────────────────────

/// Total provenance violations reported, process-wide.
static VIOLATIONS_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Read the total violation count (for diagnostics/telemetry).
#[must_use]
pub fn violations_total() -> u64 {
    VIOLATIONS_TOTAL.load(Ordering::Relaxed)
}

// ─── Violation log ───────────────────────────────────────────────────────────

/// One reported provenance violation.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub key: String,
    pub field: String,
    /// The value the offending write installed.
    pub value: Value,
}

/// Host-owned diagnostic channel. Cheaply cloneable; clones share entries.
#[derive(Clone, Default)]
pub struct ViolationLog {
    entries: Rc<RefCell<Vec<Violation>>>,
}

impl ViolationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, violation: Violation) {
        VIOLATIONS_TOTAL.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            key = %violation.key,
            field = %violation.field,
            value = %violation.value,
            "shared state mutated outside its owning instance"
        );
        self.entries.borrow_mut().push(violation);
    }

    /// Snapshot of all reported violations.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Violation> {
        self.entries.borrow().clone()
    }

    /// Drain the log, returning everything reported so far.
    #[must_use]
    pub fn take(&self) -> Vec<Violation> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl std::fmt::Debug for ViolationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViolationLog")
            .field("entries", &self.len())
            .finish()
    }
}

// ─── Guard attachment ────────────────────────────────────────────────────────

/// Attach the guard for one (component, key) pair. Call once, after first
/// render. The returned subscription owns the watcher; dropping it detaches
/// the guard.
#[must_use]
pub fn attach(
    key: &str,
    instance: &Rc<SharedObject>,
    store: &Rc<ReactiveStore>,
    stack: &ContextStack,
    violations: &ViolationLog,
) -> WatchSubscription {
    let owner = instance.id();
    let stack = stack.clone();
    let violations = violations.clone();
    store.watch_immediate(key, move |event| {
        if event.old.is_none() {
            // Initialization, not mutation.
            return;
        }
        let attributed = stack.current().is_some_and(|ctx| ctx.instance == owner);
        if !attributed {
            violations.record(Violation {
                key: event.key.clone(),
                field: event.field.clone(),
                value: event.new.clone(),
            });
        }
    })
}
