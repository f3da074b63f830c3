#![forbid(unsafe_code)]

//! Configuration-level errors for the runtime layer.
//!
//! Everything here fails fast at wiring or lifecycle time and is surfaced to
//! the component author once; there is no retry policy anywhere in this core.

use thiserror::Error;

use steward_core::{ComponentId, ObjectError};

use crate::wire::WireError;

pub type Result<T> = std::result::Result<T, StewardError>;

#[derive(Debug, Error)]
pub enum StewardError {
    #[error("duplicate shared key `{key}` in component `{component}`")]
    DuplicateSharedKey { component: String, key: String },

    #[error("wiring shared key `{key}` failed: {source}")]
    Wire {
        key: String,
        #[source]
        source: WireError,
    },

    #[error("component {} is already mounted", .id.raw())]
    AlreadyMounted { id: ComponentId },

    #[error("startup hook failed for shared key `{key}`: {source}")]
    Startup {
        key: String,
        #[source]
        source: ObjectError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let err = StewardError::DuplicateSharedKey {
            component: "app".into(),
            key: "session".into(),
        };
        assert_eq!(
            err.to_string(),
            "duplicate shared key `session` in component `app`"
        );

        let err = StewardError::AlreadyMounted {
            id: ComponentId::new(7),
        };
        assert_eq!(err.to_string(), "component 7 is already mounted");
    }
}
