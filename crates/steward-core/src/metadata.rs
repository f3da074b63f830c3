#![forbid(unsafe_code)]

//! Member classification for shared objects.
//!
//! [`extract`] inspects an object's own slots and its prototype's slots and
//! partitions them into derived accessors (getters), behavior methods, and
//! state fields. The result is derived on demand — never cached — and is a
//! pure function of the object's current slot shape, which is what makes the
//! "already wired" signal work: once wiring has replaced every data field
//! with a store-backed accessor pair, a second extraction finds no state
//! fields at all.
//!
//! # Classification rules
//!
//! Own slots win over prototype slots on name collision. Then, per slot:
//!
//! - **getter**: has a read accessor and no write accessor. A paired
//!   read/write accessor is neither a getter nor anything else — it is
//!   skipped entirely.
//! - **method**: no accessors, callable data, and not the [`CONSTRUCTOR`]
//!   slot.
//! - **state field**: no accessors, non-callable data, and the value is
//!   present. Presence means "not [`Value::Absent`]": zero, `false`, and the
//!   empty string are all state.
//!
//! Getter names are the slot-table keys, carried as first-class data.

use std::collections::HashMap;
use std::rc::Rc;

use crate::object::{CONSTRUCTOR, Datum, GetterFn, MethodFn, PropertyDescriptor, SharedObject};

/// Classified members of one object. See the module docs for the rules.
#[derive(Default)]
pub struct Metadata {
    /// Logical getter name → original read accessor.
    pub getters: HashMap<String, Rc<GetterFn>>,
    /// Method name → original body.
    pub methods: HashMap<String, Rc<MethodFn>>,
    /// State field names, sorted for deterministic iteration.
    pub state_fields: Vec<String>,
}

impl Metadata {
    /// Whether any state field was found. Empty means "already wired or
    /// stateless" — the caller's signal to skip instrumentation.
    #[must_use]
    pub fn has_state(&self) -> bool {
        !self.state_fields.is_empty()
    }

    /// Total classified members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.getters.len() + self.methods.len() + self.state_fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Metadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut getters: Vec<&str> = self.getters.keys().map(String::as_str).collect();
        getters.sort_unstable();
        let mut methods: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        methods.sort_unstable();
        f.debug_struct("Metadata")
            .field("getters", &getters)
            .field("methods", &methods)
            .field("state_fields", &self.state_fields)
            .finish()
    }
}

/// Classify `target`'s members. Pure; re-run once per wiring, never per
/// access.
#[must_use]
pub fn extract(target: &SharedObject) -> Metadata {
    let mut merged: HashMap<String, PropertyDescriptor> = HashMap::new();
    if let Some(proto) = target.prototype() {
        for (name, desc) in proto.descriptors() {
            merged.insert(name.clone(), desc.clone());
        }
    }
    for (name, desc) in target.own_descriptors() {
        merged.insert(name, desc);
    }

    let mut meta = Metadata::default();
    for (name, desc) in merged {
        if desc.is_getter_only() {
            if let Some(get) = desc.get {
                meta.getters.insert(name, get);
            }
            continue;
        }
        if desc.is_accessor() {
            // Paired accessor: not a getter, not data. Skipped.
            continue;
        }
        match desc.value {
            Some(Datum::Callable(f)) => {
                if name != CONSTRUCTOR {
                    meta.methods.insert(name, f);
                }
            }
            Some(Datum::Value(v)) => {
                if v.is_present() {
                    meta.state_fields.push(name);
                }
            }
            None => {}
        }
    }
    meta.state_fields.sort_unstable();

    tracing::debug!(
        object = target.id().raw(),
        getters = meta.getters.len(),
        methods = meta.methods.len(),
        state_fields = meta.state_fields.len(),
        "extracted metadata"
    );
    meta
}
