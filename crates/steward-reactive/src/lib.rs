#![forbid(unsafe_code)]

//! Reactive collaborators: keyed store with change notification, derived
//! value registry, and the deferred one-shot scheduler.

pub mod computed;
pub mod scheduler;
pub mod store;

pub use computed::{ComputedError, ComputedRegistry};
pub use scheduler::Scheduler;
pub use store::{ChangeEvent, RESERVED_PREFIX, ReactiveStore, StoreError, WatchSubscription};
