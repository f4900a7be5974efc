//! Error types for formstate operations.
//!
//! Validation failures are data, not errors: they travel as [`crate::Issue`] values through a
//! form's error list.  `FormError` covers wiring and configuration mistakes only.

use thiserror::Error;

/// Errors that can occur while wiring, configuring, or manipulating a form.
#[derive(Debug, Error)]
pub enum FormError {
    /// No ancestor scope provided a form context under the requested id.
    #[error("No form context found for form with id \"{id}\"")]
    ContextNotFound {
        /// The form id that was looked up.
        id: String,
    },

    /// No ancestor scope hosts a form.
    #[error("No form is in scope")]
    NoCurrentForm,

    /// A schema document is malformed.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// An array operation targeted a value that is not an array.
    #[error("Value at \"{path}\" is not an array")]
    NotAnArray {
        /// The path that was expected to hold an array.
        path: String,
    },

    /// An array operation used an index outside the array.
    #[error("Index {index} is out of bounds for \"{path}\" (length {len})")]
    IndexOutOfBounds {
        /// The path of the array.
        path: String,
        /// The offending index.
        index: usize,
        /// The length of the array at the time of the operation.
        len: usize,
    },

    /// A write targeted a path that cannot be created in the current state.
    #[error("Path \"{path}\" cannot be written")]
    UnwritablePath {
        /// The path that was written.
        path: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization or deserialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
