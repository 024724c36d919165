//! Expression resolution errors
//!
//! A verb error is terminal for its field and, by policy, for the whole
//! site's resolution. The engine logs it and skips the site; nothing
//! here aborts a batch.

use gridcase_gis::VectorError;

/// Errors a verb can signal
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    /// The verb is not in the registry
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),

    /// Arguments are malformed for this verb
    #[error("field {field}: {detail}")]
    InvalidArguments { field: String, detail: String },

    /// A `$`-reference names a key the context does not hold yet
    #[error("field {field}: {key:?} is not in the current context")]
    MissingContextKey { field: String, key: String },

    /// A lookup completed but matched nothing usable
    #[error("field {field}: {detail}")]
    NoMatch { field: String, detail: String },

    /// A vector layer failed to load
    #[error(transparent)]
    Vector(#[from] VectorError),

    /// The soil database is missing or unreadable
    #[error("soil lookup: {0}")]
    Soil(String),

    /// Filesystem failure while reading lookup data
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FunctionError {
    /// Shorthand for [`FunctionError::InvalidArguments`]
    pub fn invalid(field: &str, detail: impl Into<String>) -> Self {
        Self::InvalidArguments {
            field: field.to_string(),
            detail: detail.into(),
        }
    }

    /// Shorthand for [`FunctionError::NoMatch`]
    pub fn no_match(field: &str, detail: impl Into<String>) -> Self {
        Self::NoMatch {
            field: field.to_string(),
            detail: detail.into(),
        }
    }
}
