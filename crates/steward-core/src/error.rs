#![forbid(unsafe_code)]

//! Behavior-level errors raised by dynamic object operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ObjectError>;

/// Errors produced by [`SharedObject`](crate::object::SharedObject)
/// operations and by user-supplied method bodies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    #[error("no such member: {name}")]
    MissingMember { name: String },

    #[error("member is not callable: {name}")]
    NotCallable { name: String },

    #[error("cannot assign read-only property: {name}")]
    ReadOnlyProperty { name: String },

    /// Domain failure raised from inside a method body.
    #[error("{message}")]
    Behavior { message: String },
}

impl ObjectError {
    /// Shorthand for raising a domain error from a method body.
    #[must_use]
    pub fn behavior(message: impl Into<String>) -> Self {
        Self::Behavior {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(
            ObjectError::MissingMember {
                name: "frob".into()
            }
            .to_string(),
            "no such member: frob"
        );
        assert_eq!(
            ObjectError::behavior("out of range").to_string(),
            "out of range"
        );
    }
}
