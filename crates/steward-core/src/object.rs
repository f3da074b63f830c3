#![forbid(unsafe_code)]

//! Descriptor-based dynamic objects.
//!
//! A [`SharedObject`] is a bag of named property slots plus an optional
//! [`Prototype`] of class-level slots. Each slot is a [`PropertyDescriptor`]:
//! either a data entry (a plain [`Value`] or a callable) or an accessor pair.
//! This is the explicit, opt-in stand-in for the property reflection the
//! original host language offers: every question the member classifier asks
//! ("is it a read-only derived accessor?", "is it callable?", "does it hold a
//! present value?") is answered by the descriptor shape, never by guessing.
//!
//! # Identity
//!
//! Every object gets a process-unique [`ObjectId`] at construction. Provenance
//! attribution compares ids, not addresses, so a context frame stays
//! meaningful even when the object itself is referenced through clones of the
//! owning `Rc`.
//!
//! # Interior mutability
//!
//! Slot tables live behind a `RefCell`: wiring redefines slots in place on a
//! shared handle. Single logical thread throughout; no locks.
//!
//! # Invariants
//!
//! 1. `descriptor()` resolves own slots before prototype slots.
//! 2. Accessor evaluation never runs while the slot table is borrowed, so a
//!    getter/setter body may freely read or define other members.
//! 3. Assignment to a getter-only slot is an error; assignment to a missing
//!    slot defines a fresh data slot.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ObjectError, Result};
use crate::value::Value;

/// Reserved member name for constructor machinery. Never classified as a
/// method.
pub const CONSTRUCTOR: &str = "constructor";

/// Read accessor body. Receives the owning object so it can read other
/// members.
pub type GetterFn = dyn Fn(&SharedObject) -> Value;

/// Write accessor body.
pub type SetterFn = dyn Fn(&SharedObject, Value);

/// Behavior method body. Fallible so domain errors propagate with `?`.
pub type MethodFn = dyn Fn(&SharedObject, &[Value]) -> Result<Value>;

// ─── ObjectId ────────────────────────────────────────────────────────────────

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique object identity, used for provenance comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value (for tracing/logging).
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

// ─── Descriptors ─────────────────────────────────────────────────────────────

/// The data half of a descriptor: a plain value or a callable.
#[derive(Clone)]
pub enum Datum {
    Value(Value),
    Callable(Rc<MethodFn>),
}

impl Datum {
    #[inline]
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }
}

impl fmt::Debug for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Callable(_) => f.write_str("Callable"),
        }
    }
}

/// One property slot: accessor half and data half, mirroring the descriptor
/// triple the original host language exposes. A well-formed slot has either
/// accessors or a data entry, not both.
#[derive(Clone, Default)]
pub struct PropertyDescriptor {
    pub get: Option<Rc<GetterFn>>,
    pub set: Option<Rc<SetterFn>>,
    pub value: Option<Datum>,
}

impl PropertyDescriptor {
    /// A plain data slot.
    #[must_use]
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            get: None,
            set: None,
            value: Some(Datum::Value(value.into())),
        }
    }

    /// A callable data slot (a method before wiring, a wrapper after).
    #[must_use]
    pub fn callable(f: impl Fn(&SharedObject, &[Value]) -> Result<Value> + 'static) -> Self {
        Self {
            get: None,
            set: None,
            value: Some(Datum::Callable(Rc::new(f))),
        }
    }

    /// A read-only accessor slot.
    #[must_use]
    pub fn getter(get: impl Fn(&SharedObject) -> Value + 'static) -> Self {
        Self {
            get: Some(Rc::new(get)),
            set: None,
            value: None,
        }
    }

    /// A read/write accessor pair.
    #[must_use]
    pub fn accessor(
        get: impl Fn(&SharedObject) -> Value + 'static,
        set: impl Fn(&SharedObject, Value) + 'static,
    ) -> Self {
        Self {
            get: Some(Rc::new(get)),
            set: Some(Rc::new(set)),
            value: None,
        }
    }

    /// Whether this slot has any accessor half.
    #[inline]
    #[must_use]
    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// Whether this slot is a read-only derived accessor.
    #[inline]
    #[must_use]
    pub fn is_getter_only(&self) -> bool {
        self.get.is_some() && self.set.is_none()
    }

    /// Whether this slot holds a callable data entry.
    #[inline]
    #[must_use]
    pub fn is_callable(&self) -> bool {
        self.value.as_ref().is_some_and(Datum::is_callable)
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .field("value", &self.value)
            .finish()
    }
}

// ─── Prototype ───────────────────────────────────────────────────────────────

/// Named table of class-level slots shared by every instance built from it.
///
/// Building a prototype always installs a [`CONSTRUCTOR`] slot, so the
/// constructor-exclusion rule of member classification is exercised by every
/// class-backed object.
pub struct Prototype {
    name: String,
    slots: HashMap<String, PropertyDescriptor>,
}

impl Prototype {
    /// Start building a prototype with the given class name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PrototypeBuilder {
        PrototypeBuilder {
            name: name.into(),
            slots: HashMap::new(),
        }
    }

    /// Class name (for diagnostics).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a class-level slot.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.slots.get(name)
    }

    /// All class-level slots, unordered.
    pub fn descriptors(&self) -> impl Iterator<Item = (&String, &PropertyDescriptor)> {
        self.slots.iter()
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Prototype")
            .field("name", &self.name)
            .field("slots", &names)
            .finish()
    }
}

/// Builder for [`Prototype`].
pub struct PrototypeBuilder {
    name: String,
    slots: HashMap<String, PropertyDescriptor>,
}

impl PrototypeBuilder {
    /// Class-level default field (inherited state).
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.slots.insert(name.into(), PropertyDescriptor::data(value));
        self
    }

    /// Class-level method.
    #[must_use]
    pub fn method(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&SharedObject, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.slots.insert(name.into(), PropertyDescriptor::callable(f));
        self
    }

    /// Class-level read-only accessor.
    #[must_use]
    pub fn getter(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&SharedObject) -> Value + 'static,
    ) -> Self {
        self.slots.insert(name.into(), PropertyDescriptor::getter(get));
        self
    }

    /// Class-level read/write accessor pair.
    #[must_use]
    pub fn accessor(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&SharedObject) -> Value + 'static,
        set: impl Fn(&SharedObject, Value) + 'static,
    ) -> Self {
        self.slots
            .insert(name.into(), PropertyDescriptor::accessor(get, set));
        self
    }

    /// Finish, installing the constructor marker slot.
    #[must_use]
    pub fn build(mut self) -> Rc<Prototype> {
        self.slots
            .entry(CONSTRUCTOR.to_string())
            .or_insert_with(|| PropertyDescriptor::callable(|_, _| Ok(Value::Absent)));
        Rc::new(Prototype {
            name: self.name,
            slots: self.slots,
        })
    }
}

// ─── SharedObject ────────────────────────────────────────────────────────────

/// A dynamic object: own slots over an optional prototype.
///
/// Not `Clone`: the object *is* its identity. Share it through `Rc`.
pub struct SharedObject {
    id: ObjectId,
    slots: RefCell<HashMap<String, PropertyDescriptor>>,
    proto: Option<Rc<Prototype>>,
}

impl SharedObject {
    /// Start building a plain (prototype-less) object.
    #[must_use]
    pub fn builder() -> SharedObjectBuilder {
        SharedObjectBuilder {
            proto: None,
            slots: HashMap::new(),
        }
    }

    /// Start building an instance of the given prototype.
    #[must_use]
    pub fn with_prototype(proto: Rc<Prototype>) -> SharedObjectBuilder {
        SharedObjectBuilder {
            proto: Some(proto),
            slots: HashMap::new(),
        }
    }

    /// This object's identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The prototype, if any.
    #[must_use]
    pub fn prototype(&self) -> Option<&Rc<Prototype>> {
        self.proto.as_ref()
    }

    /// Resolve a slot: own first, then prototype. Returns a cheap clone (the
    /// closure halves are `Rc`-shared).
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<PropertyDescriptor> {
        if let Some(desc) = self.slots.borrow().get(name) {
            return Some(desc.clone());
        }
        self.proto
            .as_ref()
            .and_then(|p| p.descriptor(name).cloned())
    }

    /// Resolve an own slot only.
    #[must_use]
    pub fn own_descriptor(&self, name: &str) -> Option<PropertyDescriptor> {
        self.slots.borrow().get(name).cloned()
    }

    /// Snapshot of the own slot table.
    #[must_use]
    pub fn own_descriptors(&self) -> Vec<(String, PropertyDescriptor)> {
        self.slots
            .borrow()
            .iter()
            .map(|(name, desc)| (name.clone(), desc.clone()))
            .collect()
    }

    /// Whether `name` resolves at all.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
            || self
                .proto
                .as_ref()
                .is_some_and(|p| p.descriptor(name).is_some())
    }

    /// Define (or replace) an own slot. This is the primitive wiring uses to
    /// overlay store-backed accessors and method wrappers.
    pub fn define(&self, name: impl Into<String>, desc: PropertyDescriptor) {
        let name = name.into();
        tracing::trace!(object = self.id.raw(), slot = %name, "define slot");
        self.slots.borrow_mut().insert(name, desc);
    }

    /// Read a member. Runs the accessor if the slot has one; returns
    /// [`Value::Absent`] for missing slots and for callable slots (callables
    /// are not data).
    ///
    /// The slot table is released before the accessor body runs.
    #[must_use]
    pub fn get(&self, name: &str) -> Value {
        let Some(desc) = self.descriptor(name) else {
            return Value::Absent;
        };
        if let Some(get) = desc.get {
            return get(self);
        }
        match desc.value {
            Some(Datum::Value(v)) => v,
            _ => Value::Absent,
        }
    }

    /// Write a member. Runs the setter if the slot has one; errors on a
    /// getter-only slot; defines a fresh own data slot otherwise (assignment
    /// semantics of the original host language).
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Some(desc) = self.descriptor(name) {
            if let Some(set) = desc.set {
                set(self, value);
                return Ok(());
            }
            if desc.get.is_some() {
                return Err(ObjectError::ReadOnlyProperty {
                    name: name.to_string(),
                });
            }
        }
        self.define(name, PropertyDescriptor::data(value));
        Ok(())
    }

    /// Invoke a callable member.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let Some(desc) = self.descriptor(name) else {
            return Err(ObjectError::MissingMember {
                name: name.to_string(),
            });
        };
        match desc.value {
            Some(Datum::Callable(f)) => f(self, args),
            _ => Err(ObjectError::NotCallable {
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for SharedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.borrow();
        let mut names: Vec<&str> = slots.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("SharedObject")
            .field("id", &self.id.raw())
            .field("slots", &names)
            .field("proto", &self.proto.as_ref().map(|p| p.name()))
            .finish()
    }
}

/// Builder for [`SharedObject`].
pub struct SharedObjectBuilder {
    proto: Option<Rc<Prototype>>,
    slots: HashMap<String, PropertyDescriptor>,
}

impl SharedObjectBuilder {
    /// Own data field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.slots.insert(name.into(), PropertyDescriptor::data(value));
        self
    }

    /// Own method.
    #[must_use]
    pub fn method(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&SharedObject, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.slots.insert(name.into(), PropertyDescriptor::callable(f));
        self
    }

    /// Own read-only accessor.
    #[must_use]
    pub fn getter(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&SharedObject) -> Value + 'static,
    ) -> Self {
        self.slots.insert(name.into(), PropertyDescriptor::getter(get));
        self
    }

    /// Own read/write accessor pair.
    #[must_use]
    pub fn accessor(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&SharedObject) -> Value + 'static,
        set: impl Fn(&SharedObject, Value) + 'static,
    ) -> Self {
        self.slots
            .insert(name.into(), PropertyDescriptor::accessor(get, set));
        self
    }

    /// Finish and hand out the shared handle.
    #[must_use]
    pub fn build(self) -> Rc<SharedObject> {
        Rc::new(SharedObject {
            id: ObjectId::next(),
            slots: RefCell::new(self.slots),
            proto: self.proto,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
