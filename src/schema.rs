//! The schema capability consumed by forms.
//!
//! A form never inspects how a validator works.  It needs one capability: given the current
//! state tree, produce either a parsed value or a list of issues.  [`Schema`] is that
//! capability, and [`SchemaSource`] decides which schema is current at the moment a
//! validation starts, so schemas can be swapped while a form keeps its state.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::issue::ValidationOutcome;
use crate::json_schema::JsonSchema;
use crate::observable::Observable;

/// Anything that can validate a form's state tree.
#[async_trait]
pub trait Schema: Send + Sync {
    /// Validates `input`, returning the parsed output or the issues found.
    async fn validate(&self, input: &Value) -> ValidationOutcome;
}

/// A schema backed by a synchronous closure.
///
/// ```rust
/// use formstate::{FnSchema, Issue, ValidationOutcome};
///
/// let schema = FnSchema::new(|input: &serde_json::Value| {
///     if input["accepted"] == true {
///         ValidationOutcome::Value(input.clone())
///     } else {
///         ValidationOutcome::Issues(vec![Issue::new("Must be accepted", ["accepted"])])
///     }
/// });
/// # let _ = schema;
/// ```
pub struct FnSchema<F> {
    validate: F,
}

impl<F> FnSchema<F>
where
    F: Fn(&Value) -> ValidationOutcome + Send + Sync,
{
    /// Wraps `validate` as a schema.
    pub fn new(validate: F) -> Self {
        FnSchema { validate }
    }
}

#[async_trait]
impl<F> Schema for FnSchema<F>
where
    F: Fn(&Value) -> ValidationOutcome + Send + Sync,
{
    async fn validate(&self, input: &Value) -> ValidationOutcome {
        (self.validate)(input)
    }
}

/////////////////////////////////////////////// SchemaSource ///////////////////////////////////////////////

type SchemaGetter = Arc<dyn Fn() -> Arc<dyn Schema> + Send + Sync>;

/// Where a form finds its current schema.
#[derive(Clone)]
pub enum SchemaSource {
    /// A schema fixed for the life of the form.
    Static(Arc<dyn Schema>),
    /// A schema held in an observable cell; the latest value is used.
    Cell(watch::Receiver<Arc<dyn Schema>>),
    /// A closure consulted at every validation.
    Getter(SchemaGetter),
}

impl SchemaSource {
    /// A fixed schema.
    pub fn new(schema: impl Schema + 'static) -> Self {
        SchemaSource::Static(Arc::new(schema))
    }

    /// A schema computed by `getter` each time one is needed.
    pub fn getter<F>(getter: F) -> Self
    where
        F: Fn() -> Arc<dyn Schema> + Send + Sync + 'static,
    {
        SchemaSource::Getter(Arc::new(getter))
    }

    /// Resolves the schema that is current right now.
    pub fn current(&self) -> Arc<dyn Schema> {
        match self {
            SchemaSource::Static(schema) => Arc::clone(schema),
            SchemaSource::Cell(rx) => Arc::clone(&rx.borrow()),
            SchemaSource::Getter(getter) => getter(),
        }
    }
}

impl From<Arc<dyn Schema>> for SchemaSource {
    fn from(schema: Arc<dyn Schema>) -> Self {
        SchemaSource::Static(schema)
    }
}

impl From<&Observable<Arc<dyn Schema>>> for SchemaSource {
    fn from(cell: &Observable<Arc<dyn Schema>>) -> Self {
        SchemaSource::Cell(cell.subscribe())
    }
}

impl From<JsonSchema> for SchemaSource {
    fn from(schema: JsonSchema) -> Self {
        SchemaSource::new(schema)
    }
}

impl<F> From<FnSchema<F>> for SchemaSource
where
    F: Fn(&Value) -> ValidationOutcome + Send + Sync + 'static,
{
    fn from(schema: FnSchema<F>) -> Self {
        SchemaSource::new(schema)
    }
}

impl std::fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaSource::Static(_) => write!(f, "SchemaSource::Static"),
            SchemaSource::Cell(_) => write!(f, "SchemaSource::Cell"),
            SchemaSource::Getter(_) => write!(f, "SchemaSource::Getter"),
        }
    }
}
