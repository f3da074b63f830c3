#![forbid(unsafe_code)]

//! Call provenance: who is currently executing a shared method.
//!
//! Every wired method wrapper pushes a [`CallContext`] frame onto a
//! [`ContextStack`] for the duration of the call. The pop is *deferred* —
//! scheduled through the [`Defer`] seam to run after the current unit of work
//! and all synchronous reactions it triggered have settled. That deferral is
//! the entire correctness basis of mutation attribution: change notifications
//! produced by writes inside the method body fire while the frame is still on
//! the stack, so an observer can attribute the mutation to the instance that
//! owns the method.
//!
//! # Scope
//!
//! The stack is a value owned by the host — one per logical thread of
//! control — and handed explicitly to every wrapper that needs it. Nothing
//! here is process-global except the diagnostic counter.
//!
//! # Invariants
//!
//! 1. Nesting is LIFO for synchronous nested calls within one settling cycle.
//! 2. A frame pushed by `within` is popped exactly once, via the deferred
//!    task, whether the action returns or panics.
//! 3. The stack never underflows: a deferred pop on an empty stack is a
//!    no-op (cannot occur under correct pairing, kept defensive).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::object::ObjectId;
use crate::value::Value;

// ─── Metrics counters ────────────────────────────────────────────────────────

/// Total number of context frames ever entered.
static CONTEXTS_ENTERED_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Read the total entered-frame count (for diagnostics/telemetry).
#[must_use]
pub fn contexts_entered_total() -> u64 {
    CONTEXTS_ENTERED_TOTAL.load(Ordering::Relaxed)
}

// ─── ComponentId ─────────────────────────────────────────────────────────────

/// Opaque handle back to the component instance that owns a shared instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Create a component id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

// ─── CallContext ─────────────────────────────────────────────────────────────

/// One attribution frame: which instance's method is executing, with what
/// arguments, on behalf of which component. Immutable after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    /// Identity of the instance whose method is executing.
    pub instance: ObjectId,
    /// Logical method name.
    pub method: String,
    /// Arguments of this invocation.
    pub args: Vec<Value>,
    /// The component instance that owns the shared instance.
    pub host: ComponentId,
}

// ─── Defer seam ──────────────────────────────────────────────────────────────

/// One-shot deferred execution: run `task` after the current unit of work and
/// all synchronous reactions it triggered have settled.
///
/// Implemented by the scheduler collaborator; the stack itself has no idea
/// what "settled" means.
pub trait Defer {
    fn defer_boxed(&self, task: Box<dyn FnOnce()>);
}

// ─── ContextStack ────────────────────────────────────────────────────────────

/// LIFO stack of attribution frames with deferred pop. Cheaply cloneable
/// handle; clones share the same frames.
#[derive(Clone, Default)]
pub struct ContextStack {
    frames: Rc<RefCell<Vec<CallContext>>>,
}

impl ContextStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The top frame, if any. Never blocks, never fails.
    #[must_use]
    pub fn current(&self) -> Option<CallContext> {
        self.frames.borrow().last().cloned()
    }

    /// Current stack depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.borrow().is_empty()
    }

    /// Run `action` attributed to `ctx`.
    ///
    /// With a frame: push, run, and schedule exactly one pop through `defer`
    /// — scheduled from a drop guard, so a panicking action still pairs its
    /// push with a pop. With `None`: run directly, no stack traffic.
    pub fn within<R>(
        &self,
        ctx: Option<CallContext>,
        defer: &dyn Defer,
        action: impl FnOnce() -> R,
    ) -> R {
        let Some(ctx) = ctx else {
            return action();
        };
        CONTEXTS_ENTERED_TOTAL.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            instance = ctx.instance.raw(),
            method = %ctx.method,
            depth = self.depth(),
            "enter context"
        );
        self.frames.borrow_mut().push(ctx);
        let _guard = PopGuard {
            stack: self.clone(),
            defer,
        };
        action()
    }

    /// Pop one frame. Deferred-task target only; no-op on an empty stack.
    fn pop_one(&self) {
        match self.frames.borrow_mut().pop() {
            Some(ctx) => {
                tracing::trace!(
                    instance = ctx.instance.raw(),
                    method = %ctx.method,
                    "leave context"
                );
            }
            None => {
                tracing::warn!("deferred pop on empty context stack");
            }
        }
    }
}

impl std::fmt::Debug for ContextStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStack")
            .field("depth", &self.depth())
            .field("current", &self.current().map(|c| c.method))
            .finish()
    }
}

/// Schedules the deferred pop when the `within` scope unwinds, normally or
/// otherwise.
struct PopGuard<'a> {
    stack: ContextStack,
    defer: &'a dyn Defer,
}

impl Drop for PopGuard<'_> {
    fn drop(&mut self) {
        let stack = self.stack.clone();
        self.defer.defer_boxed(Box::new(move || stack.pop_one()));
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
