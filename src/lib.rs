//! # Formstate: Reactive Form State and Validation
//!
//! Formstate is the runtime behind a UI form.  It keeps the data a user is editing, validates
//! it against a schema, tracks which fields have been touched or changed, and orchestrates
//! reset and submission.  Rendering is left to the host: everything here is plain state and
//! methods that input components call.
//!
//! This crate provides:
//!
//! - **Form Contexts**: a [`FormContext`] owns the state tree, the error list, the touched and
//!   dirty field sets, and the validating/submitting flags, all held in [`Observable`] cells
//! - **Schema Validation**: any [`Schema`] can validate a form; [`JsonSchema`] is a ready-made
//!   one that reports every issue with its path, and `#[derive(FormSchema)]` generates schemas
//!   from Rust types
//! - **Field Attribution**: issues reported by a schema are attributed to fields by path, so
//!   `users[1].name`, `users.1.name`, and the segments `["users", 1, "name"]` all agree
//! - **Scoped Contexts**: forms are provided to a [`Scope`] and found again by id from any
//!   descendant scope
//! - **Field Controllers**: [`FieldController`] and [`ArrayField`] translate input events into
//!   touch, dirty, and validation calls
//!
//! ## Core Concepts
//!
//! ### State and Paths
//! Form state is a `serde_json::Value`.  Fields are addressed by path strings in dot and
//! bracket notation (`address.city`, `users[0].name`); see [`parse_path`] and
//! [`object_paths`].
//!
//! ### Issues
//! An [`Issue`] is a message plus an optional path.  Validation never fails with an error:
//! issues are data that flow into the form's error list and to the `on_error` callback.
//!
//! ### Touched and Dirty
//! A field is touched once the user has interacted with it and dirty while its value differs
//! from the baseline, which is the initial state or the state of the last custom reset.
//!
//! ## Usage Examples
//!
//! ### Validating a Form
//!
//! ```rust
//! use formstate::{FormOptions, JsonSchema, Scope, use_form};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let schema = JsonSchema::new(json!({
//!     "type": "object",
//!     "properties": {
//!         "name": {"type": "string", "minLength": 1},
//!         "age": {"type": "integer", "minimum": 18}
//!     },
//!     "required": ["name", "age"]
//! }))
//! .unwrap();
//!
//! let scope = Scope::root();
//! let form = use_form(
//!     &scope,
//!     FormOptions::new(schema)
//!         .id("signup")
//!         .initial_state(json!({"name": "", "age": 15})),
//! );
//!
//! // Field validation only reports, and records, the issues of one field.
//! let outcome = form.validate_field("age").await;
//! assert_eq!(outcome.issues().unwrap().len(), 1);
//! assert!(form.get_field_errors("name").is_empty());
//!
//! // Full validation replaces the error list.
//! form.validate().await;
//! assert_eq!(form.errors().get().len(), 2);
//!
//! // Descendant scopes find the form by id.
//! let found = formstate::with_context(&scope.child(), "signup").unwrap();
//! assert_eq!(found.id(), "signup");
//! # }
//! ```
//!
//! ### Schemas From Types
//!
//! ```rust
//! use formstate::{FormSchema, JsonSchema};
//! use serde_json::json;
//!
//! #[derive(FormSchema)]
//! struct Signup {
//!     #[form(min_length = 1, message = "Name is required")]
//!     name: String,
//!     #[form(min = 18)]
//!     age: u32,
//!     nickname: Option<String>,
//! }
//!
//! #[derive(FormSchema)]
//! enum Plan {
//!     Free,
//!     Pro,
//! }
//!
//! let schema = JsonSchema::of::<Signup>().unwrap();
//! assert!(schema.check(&json!({"name": "Ada", "age": 30})).is_valid());
//! assert!(!schema.check(&json!({"name": "", "age": 30})).is_valid());
//!
//! assert_eq!(Plan::form_schema()["enum"], json!(["Free", "Pro"]));
//! ```

#![deny(missing_docs)]

extern crate self as formstate;

mod array_field;
mod config;
mod error;
mod field;
mod form;
mod issue;
mod json_schema;
mod matcher;
mod observable;
mod path;
mod registry;
mod schema;
mod test_utils;

// CLI utility modules

/// Command-line interface utilities for program termination and output formatting.
///
/// This module provides common CLI utilities for the formstate binaries, including
/// error handling, formatted output, and program termination functions.
pub mod cli_utils;

pub use array_field::{ArrayField, ArrayItem};
pub use config::{ConfigParseError, FormConfig, Trigger, ValidationMode};
pub use error::FormError;
pub use field::FieldController;
pub use form::{
    FormContext, FormEvent, FormOptions, SubmitError, SubmitEvent, SubmitOutcome, use_form,
};
pub use formstate_derive::FormSchema;
pub use issue::{
    CustomValidation, Issue, IssueSegment, SUBMISSION_FAILED_MESSAGE, VALIDATION_FAILED_MESSAGE,
    ValidationOutcome,
};
pub use json_schema::{FormSchema, JsonSchema, value_type_name};
pub use matcher::{is_issue_path_equal, normalize_segment};
pub use observable::Observable;
pub use path::{
    MAX_ARRAY_PADDING, PathSegment, format_path, get_property, get_property_mut, object_paths, parse_path,
    set_property,
};
pub use registry::{ContextKey, Scope, context_key, with_context, with_current_form};
pub use schema::{FnSchema, Schema, SchemaSource};
