#![forbid(unsafe_code)]

//! Keyed reactive store with field-level change notification.
//!
//! One record per shared key; one [`Value`] slot per state field. This is the
//! backing storage that wiring redirects instance fields into, and the event
//! source the mutation guard listens to.
//!
//! # Change notification
//!
//! Every effective write produces a [`ChangeEvent`] carrying the old and new
//! values. First assignments (snapshot landing, late field creation) carry
//! `old = None`. Watchers are field-level and per-key, which is the "deep"
//! notification of the record: any field of the watched record reports.
//!
//! # Invariants
//!
//! 1. Writing a value equal to the current value is a no-op: no version bump,
//!    no notification.
//! 2. Watchers are notified in registration order, after the write has
//!    landed.
//! 3. Dropping a [`WatchSubscription`] removes the callback before the next
//!    notification cycle.
//! 4. Keys and fields under the reserved prefix are rejected at registration
//!    time, never silently accepted.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use thiserror::Error;

use steward_core::Value;

/// Names (keys or fields) starting with this prefix belong to the store
/// internals and cannot be used by shared declarations.
pub const RESERVED_PREFIX: &str = "_steward";

/// One field-level change on a watched record.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub key: String,
    pub field: String,
    /// `None` on first assignment (initial snapshot or late field creation).
    pub old: Option<Value>,
    pub new: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("shared key already registered: {key}")]
    DuplicateKey { key: String },

    #[error("unknown shared key: {key}")]
    UnknownKey { key: String },

    #[error("field already present in record `{key}`: {field}")]
    DuplicateField { key: String, field: String },

    #[error("name collides with reserved store prefix `{RESERVED_PREFIX}`: {name}")]
    ReservedName { name: String },
}

type WatchFn = dyn Fn(&ChangeEvent);

struct WatcherEntry {
    id: u64,
    key: String,
    callback: Rc<WatchFn>,
}

/// Keyed record store. Share through `Rc`; single logical thread.
#[derive(Default)]
pub struct ReactiveStore {
    records: RefCell<AHashMap<String, AHashMap<String, Value>>>,
    watchers: Rc<RefCell<Vec<WatcherEntry>>>,
    next_watcher: Cell<u64>,
    version: Cell<u64>,
}

impl ReactiveStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn check_name(name: &str) -> Result<(), StoreError> {
        if name.starts_with(RESERVED_PREFIX) {
            return Err(StoreError::ReservedName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Register an empty record for `key`. Registering twice is a
    /// configuration error.
    pub fn register(&self, key: &str) -> Result<(), StoreError> {
        Self::check_name(key)?;
        let mut records = self.records.borrow_mut();
        if records.contains_key(key) {
            return Err(StoreError::DuplicateKey {
                key: key.to_string(),
            });
        }
        records.insert(key.to_string(), AHashMap::new());
        tracing::debug!(key, "registered shared record");
        Ok(())
    }

    /// Whether a record exists for `key`.
    #[must_use]
    pub fn contains_record(&self, key: &str) -> bool {
        self.records.borrow().contains_key(key)
    }

    /// Land the initial snapshot of one field. The field must not already
    /// exist. Notifies with `old = None`.
    pub fn insert(&self, key: &str, field: &str, value: Value) -> Result<(), StoreError> {
        Self::check_name(field)?;
        {
            let mut records = self.records.borrow_mut();
            let record = records.get_mut(key).ok_or_else(|| StoreError::UnknownKey {
                key: key.to_string(),
            })?;
            if record.contains_key(field) {
                return Err(StoreError::DuplicateField {
                    key: key.to_string(),
                    field: field.to_string(),
                });
            }
            record.insert(field.to_string(), value.clone());
            self.version.set(self.version.get() + 1);
        }
        self.notify(&ChangeEvent {
            key: key.to_string(),
            field: field.to_string(),
            old: None,
            new: value,
        });
        Ok(())
    }

    /// Write one field. Returns `Ok(true)` if the value changed (and
    /// notification fired), `Ok(false)` for an equal-value no-op. A missing
    /// field behaves like a first assignment.
    pub fn set(&self, key: &str, field: &str, value: Value) -> Result<bool, StoreError> {
        Self::check_name(field)?;
        let old = {
            let mut records = self.records.borrow_mut();
            let record = records.get_mut(key).ok_or_else(|| StoreError::UnknownKey {
                key: key.to_string(),
            })?;
            let old = record.get(field).cloned();
            if old.as_ref() == Some(&value) {
                return Ok(false);
            }
            record.insert(field.to_string(), value.clone());
            self.version.set(self.version.get() + 1);
            old
        };
        self.notify(&ChangeEvent {
            key: key.to_string(),
            field: field.to_string(),
            old,
            new: value,
        });
        Ok(true)
    }

    /// Read one field.
    #[must_use]
    pub fn get(&self, key: &str, field: &str) -> Option<Value> {
        self.records.borrow().get(key)?.get(field).cloned()
    }

    /// Snapshot of a record's fields, sorted by field name. Empty if the key
    /// is unknown.
    #[must_use]
    pub fn snapshot(&self, key: &str) -> Vec<(String, Value)> {
        let records = self.records.borrow();
        let Some(record) = records.get(key) else {
            return Vec::new();
        };
        let mut fields: Vec<(String, Value)> = record
            .iter()
            .map(|(f, v)| (f.clone(), v.clone()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        fields
    }

    /// Total effective writes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Subscribe to changes on `key`'s record. Field-level events; the
    /// subscription unsubscribes on drop.
    #[must_use]
    pub fn watch(
        &self,
        key: &str,
        callback: impl Fn(&ChangeEvent) + 'static,
    ) -> WatchSubscription {
        let id = self.next_watcher.get();
        self.next_watcher.set(id + 1);
        self.watchers.borrow_mut().push(WatcherEntry {
            id,
            key: key.to_string(),
            callback: Rc::new(callback),
        });
        WatchSubscription {
            watchers: Rc::downgrade(&self.watchers),
            id,
        }
    }

    /// Like [`watch`](Self::watch), but also replays every current field of
    /// the record once, with `old = None`, before subscribing.
    #[must_use]
    pub fn watch_immediate(
        &self,
        key: &str,
        callback: impl Fn(&ChangeEvent) + 'static,
    ) -> WatchSubscription {
        for (field, value) in self.snapshot(key) {
            callback(&ChangeEvent {
                key: key.to_string(),
                field,
                old: None,
                new: value,
            });
        }
        self.watch(key, callback)
    }

    /// Deliver an event to every watcher of its key. Callbacks run with the
    /// watcher list released, so they may subscribe, unsubscribe, or write.
    fn notify(&self, event: &ChangeEvent) {
        let callbacks: Vec<Rc<WatchFn>> = self
            .watchers
            .borrow()
            .iter()
            .filter(|w| w.key == event.key)
            .map(|w| Rc::clone(&w.callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }
}

impl std::fmt::Debug for ReactiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let records = self.records.borrow();
        let mut keys: Vec<&str> = records.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("ReactiveStore")
            .field("records", &keys)
            .field("watchers", &self.watchers.borrow().len())
            .field("version", &self.version.get())
            .finish()
    }
}

/// RAII guard for a store watcher; removes the callback on drop.
pub struct WatchSubscription {
    watchers: Weak<RefCell<Vec<WatcherEntry>>>,
    id: u64,
}

impl std::fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        if let Some(watchers) = self.watchers.upgrade() {
            watchers.borrow_mut().retain(|w| w.id != self.id);
        }
    }
}
