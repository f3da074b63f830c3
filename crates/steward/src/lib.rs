#![forbid(unsafe_code)]

//! Steward public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use steward_core::{
    CallContext, ComponentId, ContextStack, Metadata, ObjectError, ObjectId, Prototype,
    SharedObject, Value, extract,
};
pub use steward_runtime::{
    Component, ComponentOptions, Host, InstallOptions, SharedSource, StewardError, Violation,
    install,
};

pub mod prelude {
    pub use steward_core as core;
    pub use steward_reactive as reactive;
    pub use steward_runtime as runtime;
}
