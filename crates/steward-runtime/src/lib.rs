#![forbid(unsafe_code)]

//! Runtime: instance wiring, mutation guarding, and the host integration
//! layer (install surface, component lifecycle, provide/inject).

pub mod error;
pub mod guard;
pub mod host;
pub mod plugin;
pub mod wire;

pub use error::{Result, StewardError};
pub use guard::{Violation, ViolationLog, violations_total};
pub use host::{Component, ComponentOptions, Host, Mixin, SharedSource};
pub use plugin::{INITIALIZE, InstallOptions, PLUGIN_NAME, install};
pub use wire::{WireError, computed_slot_name, wire};
