#![forbid(unsafe_code)]

//! Instance wiring: redirect state into the store, getters into derived
//! slots, methods into attributed wrappers.
//!
//! Wiring mutates the instance in place by redefining its own slots:
//!
//! - each state field is snapshotted into the store and replaced by an
//!   accessor pair over the store slot, so the instance member and the store
//!   read and write the same location;
//! - each getter is registered as a derived value (invalidated by any change
//!   to the key's record) and replaced by a forwarder, so repeated access is
//!   served from the memoized slot;
//! - each method is replaced by a wrapper with the original call signature
//!   that runs the body inside a context frame, which is the only remaining
//!   path into the original body.
//!
//! # Skip policy
//!
//! An instance with no state fields is assumed already wired and passes
//! through untouched — methods and getters included. This keeps a factory
//! that hands out a previously-wired object from being wired twice, at the
//! cost of also skipping a never-wired object that genuinely has no state
//! (whose methods then run unattributed). Heuristic, documented limitation.
//!
//! # Failure
//!
//! Store rejection (duplicate or reserved key/field) or duplicate derived
//! registration aborts the whole installation for this component; the error
//! is configuration-grade and must not be swallowed.

use std::cell::Cell;
use std::rc::Rc;

use thiserror::Error;

use steward_core::{
    CallContext, ComponentId, ContextStack, Metadata, PropertyDescriptor, SharedObject, Value,
};
use steward_reactive::{ComputedError, ComputedRegistry, ReactiveStore, Scheduler, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Computed(#[from] ComputedError),
}

/// Synthesized derived-slot name, unique per (key, getter).
#[must_use]
pub fn computed_slot_name(key: &str, getter: &str) -> String {
    format!("_computed_{key}_{getter}")
}

/// Wire one shared instance under `key`. See the module docs for semantics.
pub fn wire(
    key: &str,
    instance: &Rc<SharedObject>,
    metadata: &Metadata,
    store: &Rc<ReactiveStore>,
    computed: &Rc<ComputedRegistry>,
    stack: &ContextStack,
    scheduler: &Rc<Scheduler>,
    host: ComponentId,
) -> Result<(), WireError> {
    if !metadata.has_state() {
        tracing::debug!(key, "no state fields; instance passes through unwired");
        return Ok(());
    }

    store.register(key)?;

    for field in &metadata.state_fields {
        let snapshot = instance.get(field);
        store.insert(key, field, snapshot)?;

        let read = {
            let (store, key, field) = (Rc::clone(store), key.to_string(), field.clone());
            move |_this: &SharedObject| store.get(&key, &field).unwrap_or(Value::Absent)
        };
        let write = {
            let (store, key, field) = (Rc::clone(store), key.to_string(), field.clone());
            move |_this: &SharedObject, value: Value| {
                if let Err(error) = store.set(&key, &field, value) {
                    // Unreachable once wiring succeeded; the record exists.
                    tracing::error!(%error, %key, %field, "store-backed write failed");
                }
            }
        };
        instance.define(field.clone(), PropertyDescriptor::accessor(read, write));
    }

    let mut getter_names: Vec<&String> = metadata.getters.keys().collect();
    getter_names.sort_unstable();
    for name in getter_names {
        let slot = computed_slot_name(key, name);

        let dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&dirty);
        let watch = store.watch(key, move |_| flag.set(true));

        // Weak: the entry must not keep the instance alive (the instance's
        // own forwarder keeps the registry alive, and the registry holds
        // this closure).
        let weak_instance = Rc::downgrade(instance);
        let original = Rc::clone(&metadata.getters[name]);
        let compute = move || match weak_instance.upgrade() {
            Some(this) => original(&this),
            None => Value::Absent,
        };
        computed.register(&slot, compute, dirty, watch)?;

        let forward = {
            let registry = Rc::clone(computed);
            move |_this: &SharedObject| registry.get(&slot).unwrap_or(Value::Absent)
        };
        instance.define(name.clone(), PropertyDescriptor::getter(forward));
    }

    let mut method_names: Vec<&String> = metadata.methods.keys().collect();
    method_names.sort_unstable();
    for name in method_names {
        let original = Rc::clone(&metadata.methods[name]);
        let stack = stack.clone();
        let scheduler = Rc::clone(scheduler);
        let method = name.clone();
        instance.define(
            name.clone(),
            PropertyDescriptor::callable(move |this, args| {
                let ctx = CallContext {
                    instance: this.id(),
                    method: method.clone(),
                    args: args.to_vec(),
                    host,
                };
                stack.within(Some(ctx), scheduler.as_ref(), || original(this, args))
            }),
        );
    }

    tracing::info!(
        key,
        state_fields = metadata.state_fields.len(),
        getters = metadata.getters.len(),
        methods = metadata.methods.len(),
        "wired shared instance"
    );
    Ok(())
}
