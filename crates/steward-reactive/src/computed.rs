#![forbid(unsafe_code)]

//! Derived-value registry: named, memoized computations over shared state.
//!
//! Each entry pairs a compute closure with a cached value, a dirty flag, and
//! a version counter. The dirty flag is owned jointly with whoever wired the
//! entry: the wirer subscribes a store watcher that raises the flag on any
//! change to the backing record, and parks the subscription inside the entry
//! so invalidation lives exactly as long as the entry does.
//!
//! # Invariants
//!
//! 1. `get()` never returns a stale value: a raised dirty flag forces one
//!    recomputation before the cached value is handed out.
//! 2. The compute closure runs at most once per invalidation cycle
//!    (memoization); `version` increments by exactly 1 per recomputation.
//! 3. Duplicate names are rejected — re-wiring cannot silently stack
//!    derived slots.
//!
//! # Failure modes
//!
//! - **Re-entrant access to the same entry** (a computation reading itself)
//!   panics on the cache borrow. Distinct entries may read each other freely.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ahash::AHashMap;
use thiserror::Error;

use steward_core::Value;

use crate::store::WatchSubscription;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputedError {
    #[error("derived value already registered: {name}")]
    DuplicateEntry { name: String },
}

type ComputeFn = dyn Fn() -> Value;

struct ComputedEntry {
    compute: Rc<ComputeFn>,
    cached: RefCell<Option<Value>>,
    dirty: Rc<Cell<bool>>,
    version: Cell<u64>,
    /// Keeps the invalidation watcher alive for the entry's lifetime.
    _watch: WatchSubscription,
}

/// Registry of named derived values. Share through `Rc`.
#[derive(Default)]
pub struct ComputedRegistry {
    entries: RefCell<AHashMap<String, Rc<ComputedEntry>>>,
}

impl ComputedRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a derived value.
    ///
    /// `dirty` is the shared invalidation flag — typically raised by the
    /// watcher behind `watch` — and should start raised so the first `get`
    /// computes. Duplicate names are rejected.
    pub fn register(
        &self,
        name: &str,
        compute: impl Fn() -> Value + 'static,
        dirty: Rc<Cell<bool>>,
        watch: WatchSubscription,
    ) -> Result<(), ComputedError> {
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(name) {
            return Err(ComputedError::DuplicateEntry {
                name: name.to_string(),
            });
        }
        entries.insert(
            name.to_string(),
            Rc::new(ComputedEntry {
                compute: Rc::new(compute),
                cached: RefCell::new(None),
                dirty,
                version: Cell::new(0),
                _watch: watch,
            }),
        );
        tracing::debug!(name, "registered derived value");
        Ok(())
    }

    /// Current value of `name`, recomputing only if invalidated. `None` for
    /// an unknown entry.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        let entry = self.entries.borrow().get(name).map(Rc::clone)?;
        if entry.dirty.get() || entry.cached.borrow().is_none() {
            // Compute with the registry released: the closure may read other
            // entries or shared state.
            let value = (entry.compute)();
            *entry.cached.borrow_mut() = Some(value);
            entry.dirty.set(false);
            entry.version.set(entry.version.get() + 1);
        }
        entry.cached.borrow().clone()
    }

    /// Recomputation count for `name`. `None` for an unknown entry.
    #[must_use]
    pub fn version(&self, name: &str) -> Option<u64> {
        self.entries
            .borrow()
            .get(name)
            .map(|e| e.version.get())
    }

    /// Whether `name` is currently invalidated.
    #[must_use]
    pub fn is_dirty(&self, name: &str) -> Option<bool> {
        self.entries.borrow().get(name).map(|e| e.dirty.get())
    }

    /// Force recomputation of `name` on its next read. Returns `false` for an
    /// unknown entry.
    pub fn invalidate(&self, name: &str) -> bool {
        match self.entries.borrow().get(name) {
            Some(entry) => {
                entry.dirty.set(true);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
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

impl std::fmt::Debug for ComputedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.borrow();
        let mut names: Vec<&str> = entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ComputedRegistry")
            .field("entries", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ReactiveStore;

    fn store_with_record() -> Rc<ReactiveStore> {
        let store = Rc::new(ReactiveStore::new());
        store.register("k").unwrap();
        store.insert("k", "value", Value::Int(10)).unwrap();
        store
    }

    /// A registered entry invalidated by changes to `k`, counting
    /// computations.
    fn register_doubler(
        registry: &ComputedRegistry,
        store: &Rc<ReactiveStore>,
        runs: &Rc<Cell<u32>>,
    ) {
        let dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&dirty);
        let watch = store.watch("k", move |_| flag.set(true));

        let (s, r) = (Rc::clone(store), Rc::clone(runs));
        registry
            .register(
                "_computed_k_doubled",
                move || {
                    r.set(r.get() + 1);
                    let v = s.get("k", "value").and_then(|v| v.as_int()).unwrap_or(0);
                    Value::Int(v * 2)
                },
                dirty,
                watch,
            )
            .unwrap();
    }

    #[test]
    fn first_get_computes() {
        let store = store_with_record();
        let registry = ComputedRegistry::new();
        let runs = Rc::new(Cell::new(0));
        register_doubler(&registry, &store, &runs);

        assert_eq!(registry.get("_computed_k_doubled"), Some(Value::Int(20)));
        assert_eq!(runs.get(), 1);
        assert_eq!(registry.version("_computed_k_doubled"), Some(1));
    }

    #[test]
    fn repeated_get_is_memoized() {
        let store = store_with_record();
        let registry = ComputedRegistry::new();
        let runs = Rc::new(Cell::new(0));
        register_doubler(&registry, &store, &runs);

        let _ = registry.get("_computed_k_doubled");
        let _ = registry.get("_computed_k_doubled");
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn store_change_invalidates_once() {
        let store = store_with_record();
        let registry = ComputedRegistry::new();
        let runs = Rc::new(Cell::new(0));
        register_doubler(&registry, &store, &runs);

        let _ = registry.get("_computed_k_doubled");
        store.set("k", "value", Value::Int(21)).unwrap();
        assert_eq!(registry.is_dirty("_computed_k_doubled"), Some(true));

        assert_eq!(registry.get("_computed_k_doubled"), Some(Value::Int(42)));
        assert_eq!(registry.get("_computed_k_doubled"), Some(Value::Int(42)));
        assert_eq!(runs.get(), 2);
        assert_eq!(registry.version("_computed_k_doubled"), Some(2));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let store = store_with_record();
        let registry = ComputedRegistry::new();
        let runs = Rc::new(Cell::new(0));
        register_doubler(&registry, &store, &runs);

        let dirty = Rc::new(Cell::new(true));
        let watch = store.watch("k", |_| {});
        let err = registry
            .register("_computed_k_doubled", || Value::Absent, dirty, watch)
            .unwrap_err();
        assert_eq!(
            err,
            ComputedError::DuplicateEntry {
                name: "_computed_k_doubled".into()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn invalidate_forces_recompute_without_a_store_change() {
        let store = store_with_record();
        let registry = ComputedRegistry::new();
        let runs = Rc::new(Cell::new(0));
        register_doubler(&registry, &store, &runs);

        let _ = registry.get("_computed_k_doubled");
        assert_eq!(runs.get(), 1);

        assert!(registry.invalidate("_computed_k_doubled"));
        assert_eq!(registry.is_dirty("_computed_k_doubled"), Some(true));
        let _ = registry.get("_computed_k_doubled");
        assert_eq!(runs.get(), 2);

        assert!(!registry.invalidate("ghost"));
    }

    #[test]
    fn unknown_entry_reads_none() {
        let registry = ComputedRegistry::new();
        assert_eq!(registry.get("ghost"), None);
        assert_eq!(registry.version("ghost"), None);
        assert!(!registry.contains("ghost"));
    }

    #[test]
    fn entries_may_read_each_other() {
        let store = store_with_record();
        let registry = Rc::new(ComputedRegistry::new());

        let dirty_a = Rc::new(Cell::new(true));
        let flag = Rc::clone(&dirty_a);
        let watch_a = store.watch("k", move |_| flag.set(true));
        let s = Rc::clone(&store);
        registry
            .register(
                "base",
                move || Value::Int(s.get("k", "value").and_then(|v| v.as_int()).unwrap_or(0)),
                dirty_a,
                watch_a,
            )
            .unwrap();

        let dirty_b = Rc::new(Cell::new(true));
        let flag = Rc::clone(&dirty_b);
        let watch_b = store.watch("k", move |_| flag.set(true));
        let r = Rc::clone(&registry);
        registry
            .register(
                "derived",
                move || {
                    let base = r.get("base").and_then(|v| v.as_int()).unwrap_or(0);
                    Value::Int(base + 1)
                },
                dirty_b,
                watch_b,
            )
            .unwrap();

        assert_eq!(registry.get("derived"), Some(Value::Int(11)));
        store.set("k", "value", Value::Int(99)).unwrap();
        assert_eq!(registry.get("derived"), Some(Value::Int(100)));
    }
}
