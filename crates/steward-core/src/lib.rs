#![forbid(unsafe_code)]

//! Core: dynamic object model, member classification, and call provenance.

pub mod context;
pub mod error;
pub mod metadata;
pub mod object;
pub mod value;

pub use context::{CallContext, ComponentId, ContextStack, Defer};
pub use error::{ObjectError, Result};
pub use metadata::{Metadata, extract};
pub use object::{
    CONSTRUCTOR, Datum, ObjectId, PropertyDescriptor, Prototype, PrototypeBuilder, SharedObject,
    SharedObjectBuilder,
};
pub use value::Value;
