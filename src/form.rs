//! # Form Context
//!
//! [`FormContext`] is the engine behind a form: it owns the working state tree, the error list,
//! the touched and dirty field sets, and the status flags, and it orchestrates validation,
//! reset, and submission against a [`Schema`](crate::Schema).
//!
//! ## Lifecycle
//!
//! A context is built from [`FormOptions`], usually through [`use_form`], which also provides it
//! to a [`Scope`] so that descendants can find it by id with [`crate::with_context`].  The
//! initial state and errors are snapshotted at construction and never change afterwards; they
//! are the baseline for dirtiness and for [`FormContext::reset`].
//!
//! ## Validation
//!
//! - [`FormContext::validate`] validates the whole state, replaces the error list with the
//!   result, and runs the `on_validate` and `on_error` callbacks.
//! - [`FormContext::validate_field`] validates the whole state too, but reconciles only the
//!   errors of one path and runs no callbacks.
//!
//! Overlapping validations are not ordered: whichever finishes last writes the error list.
//! [`FormContext::is_validating`] stays true while any validation is in flight.
//!
//! ## Example
//!
//! ```rust
//! use formstate::{FormEvent, FormOptions, JsonSchema, Scope, SubmitOutcome, use_form};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let schema = JsonSchema::new(json!({
//!     "type": "object",
//!     "properties": {"name": {"type": "string", "minLength": 1}},
//!     "required": ["name"]
//! }))
//! .unwrap();
//! let scope = Scope::root();
//! let form = use_form(
//!     &scope,
//!     FormOptions::new(schema).initial_state(json!({"name": ""})),
//! );
//!
//! let mut event = FormEvent::default();
//! assert!(matches!(form.submit(&mut event).await, SubmitOutcome::Invalid(_)));
//! assert!(event.is_default_prevented());
//! assert_eq!(form.get_field_errors("name").len(), 1);
//!
//! form.set_state(json!({"name": "Ada"}), true).await;
//! assert!(form.is_valid());
//! # }
//! ```

use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::config::{FormConfig, Trigger, ValidationMode};
use crate::issue::{
    CustomValidation, Issue, SUBMISSION_FAILED_MESSAGE, VALIDATION_FAILED_MESSAGE,
    ValidationOutcome,
};
use crate::matcher::is_issue_path_equal;
use crate::observable::Observable;
use crate::path::{get_property, object_paths, parse_path, set_property};
use crate::registry::{Scope, context_key};
use crate::schema::SchemaSource;

/// The error type submit callbacks may fail with.
pub type SubmitError = Box<dyn std::error::Error + Send + Sync>;

type ValidateHook = Arc<dyn Fn(Value) -> BoxFuture<'static, CustomValidation> + Send + Sync>;
type ResetHook = Arc<dyn Fn() + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&[Issue]) + Send + Sync>;
type SubmitHook = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), SubmitError>> + Send + Sync>;

#[derive(Clone, Default)]
struct Callbacks {
    on_validate: Option<ValidateHook>,
    on_reset: Option<ResetHook>,
    on_error: Option<ErrorHook>,
    on_submit: Option<SubmitHook>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//////////////////////////////////////////// SubmitEvent ////////////////////////////////////////////

/// The host event that triggered a submission.
pub trait SubmitEvent {
    /// Stops the host's native submission.
    fn prevent_default(&mut self);
}

/// A plain submit event that records whether native submission was prevented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormEvent {
    default_prevented: bool,
}

impl FormEvent {
    /// Whether [`SubmitEvent::prevent_default`] was called.
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }
}

impl SubmitEvent for FormEvent {
    fn prevent_default(&mut self) {
        self.default_prevented = true;
    }
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The form was valid and the submit callback completed.
    Submitted(Value),
    /// The form was valid and no callback was given; native submission may proceed.
    Native(Value),
    /// Validation failed; the callback was not called.
    Invalid(Vec<Issue>),
    /// The submit callback failed or panicked.
    Failed(Issue),
}

//////////////////////////////////////////// FormOptions ////////////////////////////////////////////

/// Options for building a [`FormContext`].
pub struct FormOptions {
    schema: SchemaSource,
    id: Option<String>,
    initial_state: Value,
    initial_errors: Vec<Issue>,
    mode: ValidationMode,
    validate_on: BTreeSet<Trigger>,
    callbacks: Callbacks,
}

impl FormOptions {
    /// Options with the given schema and every other setting at its default.
    pub fn new(schema: impl Into<SchemaSource>) -> Self {
        FormOptions {
            schema: schema.into(),
            id: None,
            initial_state: Value::Object(Map::new()),
            initial_errors: Vec::new(),
            mode: ValidationMode::default(),
            validate_on: Trigger::defaults(),
            callbacks: Callbacks::default(),
        }
    }

    /// Sets the form id.  A `form-<uuid>` id is generated otherwise.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the initial state tree.
    pub fn initial_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }

    /// Sets the initial error list.
    pub fn initial_errors(mut self, errors: Vec<Issue>) -> Self {
        self.initial_errors = errors;
        self
    }

    /// Sets the validation mode.
    pub fn mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the triggers that run field validation.
    pub fn validate_on(mut self, triggers: impl IntoIterator<Item = Trigger>) -> Self {
        self.validate_on = triggers.into_iter().collect();
        self
    }

    /// Applies every setting present in `config`.
    pub fn config(mut self, config: FormConfig) -> Self {
        if let Some(id) = config.id {
            self.id = Some(id);
        }
        if let Some(mode) = config.mode {
            self.mode = mode;
        }
        if let Some(validate_on) = config.validate_on {
            self.validate_on = validate_on;
        }
        if let Some(state) = config.initial_state {
            self.initial_state = state;
        }
        if let Some(errors) = config.initial_errors {
            self.initial_errors = errors;
        }
        self
    }

    /// Runs after the schema accepts the state during [`FormContext::validate`].
    ///
    /// The hook may return `bool`, `()`, `Vec<Issue>`, or [`CustomValidation`].
    pub fn on_validate<F, Fut, R>(mut self, hook: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Into<CustomValidation> + 'static,
    {
        self.callbacks.on_validate = Some(Arc::new(
            move |value: Value| -> BoxFuture<'static, CustomValidation> {
                hook(value).map(Into::into).boxed()
            },
        ));
        self
    }

    /// Runs after every reset, before any re-validation.
    pub fn on_reset<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.on_reset = Some(Arc::new(hook));
        self
    }

    /// Runs whenever full validation fails or a submission fails.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[Issue]) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Some(Arc::new(hook));
        self
    }

    /// The callback [`FormContext::submit`] hands the parsed value to.
    pub fn on_submit<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SubmitError>> + Send + 'static,
    {
        self.callbacks.on_submit = Some(Arc::new(move |value| hook(value).boxed()));
        self
    }
}

impl std::fmt::Debug for FormOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormOptions")
            .field("schema", &self.schema)
            .field("id", &self.id)
            .field("initial_state", &self.initial_state)
            .field("initial_errors", &self.initial_errors)
            .field("mode", &self.mode)
            .field("validate_on", &self.validate_on)
            .finish()
    }
}

//////////////////////////////////////////// FormContext ////////////////////////////////////////////

/// A form instance.  Clones are handles to the same instance.
#[derive(Clone)]
pub struct FormContext {
    inner: Arc<FormInner>,
}

struct FormInner {
    id: String,
    schema: SchemaSource,
    state: Observable<Value>,
    initial_state: Value,
    errors: Observable<Vec<Issue>>,
    initial_errors: Vec<Issue>,
    touched_fields: Observable<BTreeSet<String>>,
    dirty_fields: Observable<BTreeSet<String>>,
    validations: Observable<usize>,
    is_submitting: Observable<bool>,
    mode: ValidationMode,
    validate_on: BTreeSet<Trigger>,
    last_reset_state: Mutex<Option<Value>>,
    last_reset_errors: Mutex<Option<Vec<Issue>>>,
    callbacks: Callbacks,
}

/// Holds the in-flight validation count up for as long as it lives.
struct ValidatingGuard<'a> {
    validations: &'a Observable<usize>,
}

impl<'a> ValidatingGuard<'a> {
    fn enter(validations: &'a Observable<usize>) -> Self {
        validations.update(|count| *count += 1);
        ValidatingGuard { validations }
    }
}

impl Drop for ValidatingGuard<'_> {
    fn drop(&mut self) {
        self.validations
            .update(|count| *count = count.saturating_sub(1));
    }
}

/// Holds a flag true for as long as it lives.
struct FlagGuard<'a> {
    flag: &'a Observable<bool>,
}

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a Observable<bool>) -> Self {
        flag.set(true);
        FlagGuard { flag }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Creates a form, provides it to `scope` under its id, and makes it the scope's current form.
pub fn use_form(scope: &Scope, options: FormOptions) -> FormContext {
    let form = FormContext::new(options);
    scope.provide(context_key(form.id()), form.clone());
    scope.set_current_form(form.id());
    form
}

impl FormContext {
    /// Builds a form from `options` without providing it to any scope.
    pub fn new(options: FormOptions) -> Self {
        let id = options
            .id
            .unwrap_or_else(|| format!("form-{}", uuid::Uuid::new_v4()));
        debug!(form = %id, mode = %options.mode, "creating form");
        FormContext {
            inner: Arc::new(FormInner {
                schema: options.schema,
                state: Observable::new(options.initial_state.clone()),
                initial_state: options.initial_state,
                errors: Observable::new(options.initial_errors.clone()),
                initial_errors: options.initial_errors,
                touched_fields: Observable::default(),
                dirty_fields: Observable::default(),
                validations: Observable::new(0),
                is_submitting: Observable::new(false),
                mode: options.mode,
                validate_on: options.validate_on,
                last_reset_state: Mutex::new(None),
                last_reset_errors: Mutex::new(None),
                callbacks: options.callbacks,
                id,
            }),
        }
    }

    /// The form id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Where the form finds its schema.
    pub fn schema(&self) -> &SchemaSource {
        &self.inner.schema
    }

    /// The working state tree.
    pub fn state(&self) -> &Observable<Value> {
        &self.inner.state
    }

    /// The state snapshot taken at construction.
    pub fn initial_state(&self) -> &Value {
        &self.inner.initial_state
    }

    /// The current errors, in insertion order.
    pub fn errors(&self) -> &Observable<Vec<Issue>> {
        &self.inner.errors
    }

    /// The errors supplied at construction.
    pub fn initial_errors(&self) -> &[Issue] {
        &self.inner.initial_errors
    }

    /// Paths the user has interacted with.
    pub fn touched_fields(&self) -> &Observable<BTreeSet<String>> {
        &self.inner.touched_fields
    }

    /// Paths whose value differs from the baseline.
    pub fn dirty_fields(&self) -> &Observable<BTreeSet<String>> {
        &self.inner.dirty_fields
    }

    /// The number of validations in flight.
    pub fn validations(&self) -> &Observable<usize> {
        &self.inner.validations
    }

    /// The validation mode.
    pub fn mode(&self) -> ValidationMode {
        self.inner.mode
    }

    /// The triggers that run field validation.
    pub fn validate_on(&self) -> &BTreeSet<Trigger> {
        &self.inner.validate_on
    }

    /// True while at least one validation is in flight.
    pub fn is_validating(&self) -> bool {
        self.inner.validations.with(|count| *count > 0)
    }

    /// True while a submission is in progress.
    pub fn is_submitting(&self) -> bool {
        self.inner.is_submitting.get()
    }

    /// True when the error list is empty.
    pub fn is_valid(&self) -> bool {
        self.inner.errors.with(Vec::is_empty)
    }

    /// True when any field has been touched.
    pub fn is_touched(&self) -> bool {
        self.inner.touched_fields.with(|fields| !fields.is_empty())
    }

    /// True when any field is dirty.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty_fields.with(|fields| !fields.is_empty())
    }

    /// Validates the whole form.
    ///
    /// The error list is replaced with the issues found, or cleared on success.  When the
    /// schema passes, `on_validate` may still reject the data, either as a whole (a single
    /// form-level "Validation failed" issue) or with its own issues.  `on_error` runs on every
    /// failure.
    pub async fn validate(&self) -> ValidationOutcome {
        let inner = &*self.inner;
        let _validating = ValidatingGuard::enter(&inner.validations);
        trace!(form = %inner.id, "validating form");

        let schema = inner.schema.current();
        let input = inner.state.get();
        let value = match schema.validate(&input).await {
            ValidationOutcome::Issues(issues) => return self.fail(issues),
            ValidationOutcome::Value(value) => value,
        };

        if let Some(on_validate) = &inner.callbacks.on_validate {
            match on_validate(value.clone()).await {
                CustomValidation::Fail => {
                    return self.fail(vec![Issue::form_level(VALIDATION_FAILED_MESSAGE)]);
                }
                CustomValidation::Issues(issues) if !issues.is_empty() => {
                    return self.fail(issues);
                }
                _ => {}
            }
        }

        inner.errors.set(Vec::new());
        debug!(form = %inner.id, "form is valid");
        ValidationOutcome::Value(value)
    }

    fn fail(&self, issues: Vec<Issue>) -> ValidationOutcome {
        self.inner.errors.set(issues.clone());
        if let Some(on_error) = &self.inner.callbacks.on_error {
            on_error(&issues);
        }
        debug!(form = %self.inner.id, issues = issues.len(), "form is invalid");
        ValidationOutcome::Issues(issues)
    }

    /// Validates the form and reconciles the errors of the field at `path`.
    ///
    /// Existing errors for `path` are always removed first; the issues the schema reports for
    /// `path` are then appended.  Errors of other fields are left alone.  No callbacks run.
    ///
    /// # Returns
    /// * `Issues` - The issues reported for `path`
    /// * `Value` - The field's parsed value when the whole form passed, or its current value
    ///   when only other fields failed (`null` when absent)
    pub async fn validate_field(&self, path: &str) -> ValidationOutcome {
        let inner = &*self.inner;
        let _validating = ValidatingGuard::enter(&inner.validations);
        let schema = inner.schema.current();
        let input = inner.state.get();
        let outcome = schema.validate(&input).await;
        self.reconcile_field(path, &outcome)
    }

    fn reconcile_field(&self, path: &str, outcome: &ValidationOutcome) -> ValidationOutcome {
        let target = parse_path(path);
        let matching: Vec<Issue> = outcome
            .issues()
            .unwrap_or_default()
            .iter()
            .filter(|issue| is_issue_path_equal(issue.path.as_deref(), &target))
            .cloned()
            .collect();
        self.inner.errors.update(|errors| {
            errors.retain(|issue| !is_issue_path_equal(issue.path.as_deref(), &target));
            errors.extend(matching.iter().cloned());
        });
        trace!(form = %self.inner.id, path = %path, issues = matching.len(), "validated field");

        match outcome {
            ValidationOutcome::Value(parsed) => {
                ValidationOutcome::Value(get_property(parsed, path).cloned().unwrap_or_default())
            }
            ValidationOutcome::Issues(_) if !matching.is_empty() => {
                ValidationOutcome::Issues(matching)
            }
            ValidationOutcome::Issues(_) => ValidationOutcome::Value(
                self.inner
                    .state
                    .with(|state| get_property(state, path).cloned().unwrap_or_default()),
            ),
        }
    }

    /// Resets state, errors, and interaction tracking.
    ///
    /// A given `state` becomes both the live state and the new baseline for dirtiness; without
    /// one the state reverts to the initial state.  Errors are handled the same way.  Touched
    /// and dirty fields are cleared, then `on_reset` runs.  When `should_validate` is set, the
    /// form is validated and this call returns only after that validation completes.
    pub async fn reset(
        &self,
        state: Option<Value>,
        errors: Option<Vec<Issue>>,
        should_validate: bool,
    ) {
        let inner = &*self.inner;
        let custom = state.is_some();
        let next_state = {
            let mut last = lock(&inner.last_reset_state);
            last.clone_from(&state);
            state.unwrap_or_else(|| inner.initial_state.clone())
        };
        let next_errors = {
            let mut last = lock(&inner.last_reset_errors);
            last.clone_from(&errors);
            errors.unwrap_or_else(|| inner.initial_errors.clone())
        };

        inner.state.set(next_state);
        inner.errors.set(next_errors);
        inner.touched_fields.set(BTreeSet::new());
        inner.dirty_fields.set(BTreeSet::new());
        debug!(form = %inner.id, custom_state = custom, "form reset");

        if let Some(on_reset) = &inner.callbacks.on_reset {
            on_reset();
        }
        if should_validate {
            self.validate().await;
        }
    }

    /// Merges `partial` into the top level of the state.
    ///
    /// Every path inside `partial` is marked touched and dirty.  When `should_validate` is set,
    /// each of those paths is validated as if by [`FormContext::validate_field`], sharing one
    /// schema run.  A `partial` that is not an object is ignored.
    pub async fn set_state(&self, partial: Value, should_validate: bool) {
        let inner = &*self.inner;
        let Some(updates) = partial.as_object() else {
            warn!(form = %inner.id, "ignoring non-object state update");
            return;
        };
        let paths = object_paths(&partial);

        inner.state.update(|state| {
            if !state.is_object() {
                *state = Value::Object(Map::new());
            }
            if let Some(state) = state.as_object_mut() {
                for (key, value) in updates {
                    state.insert(key.clone(), value.clone());
                }
            }
        });
        inner
            .dirty_fields
            .update(|fields| fields.extend(paths.iter().cloned()));
        inner
            .touched_fields
            .update(|fields| fields.extend(paths.iter().cloned()));
        trace!(form = %inner.id, paths = paths.len(), "state updated");

        if should_validate && !paths.is_empty() {
            let _validating = ValidatingGuard::enter(&inner.validations);
            let schema = inner.schema.current();
            let input = inner.state.get();
            let outcome = schema.validate(&input).await;
            for path in &paths {
                self.reconcile_field(path, &outcome);
            }
        }
    }

    /// Writes `value` at `path`, creating intermediate containers as needed.
    ///
    /// Returns false, leaving the value unwritten, when the path cannot be written; see
    /// [`set_property`](crate::set_property).
    pub fn set_value(&self, path: &str, value: Value) -> bool {
        let written = self
            .inner
            .state
            .update_if(|state| set_property(state, path, value));
        if !written {
            warn!(form = %self.inner.id, path = %path, "path cannot be written");
        }
        written
    }

    /// Appends `issues` to the error list.
    pub fn set_errors(&self, issues: Vec<Issue>) {
        self.inner.errors.update(|errors| errors.extend(issues));
    }

    /// Empties the error list.
    pub fn clear_errors(&self) {
        self.inner.errors.set(Vec::new());
    }

    /// The errors attributed to the field at `path`.
    pub fn get_field_errors(&self, path: &str) -> Vec<Issue> {
        let target = parse_path(path);
        self.inner.errors.with(|errors| {
            errors
                .iter()
                .filter(|issue| is_issue_path_equal(issue.path.as_deref(), &target))
                .cloned()
                .collect()
        })
    }

    /// Marks `path` touched.
    pub fn touch_field(&self, path: &str) {
        self.inner
            .touched_fields
            .update_if(|fields| fields.insert(path.to_string()));
    }

    /// Marks every path of the current state touched, replacing the touched set.
    pub fn touch_all_fields(&self) {
        let paths = self.inner.state.with(object_paths);
        self.inner.touched_fields.set(paths.into_iter().collect());
    }

    /// Recomputes whether `path` is dirty.
    ///
    /// The field is dirty when its value differs from the value at the same path in the
    /// baseline: the state of the last reset that supplied one, or the initial state.
    pub fn dirty_field(&self, path: &str) {
        let inner = &*self.inner;
        let current = inner
            .state
            .with(|state| get_property(state, path).cloned());
        let dirty = {
            let last = lock(&inner.last_reset_state);
            let baseline = last.as_ref().unwrap_or(&inner.initial_state);
            get_property(baseline, path) != current.as_ref()
        };
        inner.dirty_fields.update_if(|fields| {
            if dirty {
                fields.insert(path.to_string())
            } else {
                fields.remove(path)
            }
        });
    }

    /// Marks every path of the current state dirty, replacing the dirty set.
    pub fn dirty_all_fields(&self) {
        let paths = self.inner.state.with(object_paths);
        self.inner.dirty_fields.set(paths.into_iter().collect());
    }

    /// Submits the form through the `on_submit` callback, if one was configured.
    ///
    /// See [`FormContext::submit_with`].
    pub async fn submit<E>(&self, event: &mut E) -> SubmitOutcome
    where
        E: SubmitEvent + ?Sized,
    {
        let callback = self
            .inner
            .callbacks
            .on_submit
            .clone()
            .map(|hook| move |value: Value| hook(value));
        self.run_submit(event, callback).await
    }

    /// Submits the form through `callback`.
    ///
    /// Every field is marked touched and dirty, then the form is validated.  An invalid form
    /// prevents the native submission and never reaches the callback; `on_error` has already
    /// run as part of validation.  A valid form prevents the native submission and awaits the
    /// callback.  A callback error or panic is reported to `on_error` as a single form-level
    /// issue and never propagates.
    pub async fn submit_with<E, F, Fut>(&self, event: &mut E, callback: F) -> SubmitOutcome
    where
        E: SubmitEvent + ?Sized,
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<(), SubmitError>>,
    {
        self.run_submit(event, Some(callback)).await
    }

    async fn run_submit<E, F, Fut>(&self, event: &mut E, callback: Option<F>) -> SubmitOutcome
    where
        E: SubmitEvent + ?Sized,
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<(), SubmitError>>,
    {
        let inner = &*self.inner;
        let _submitting = FlagGuard::raise(&inner.is_submitting);
        self.touch_all_fields();
        self.dirty_all_fields();

        let value = match self.validate().await {
            ValidationOutcome::Issues(issues) => {
                event.prevent_default();
                debug!(form = %inner.id, issues = issues.len(), "submit blocked by validation");
                return SubmitOutcome::Invalid(issues);
            }
            ValidationOutcome::Value(value) => value,
        };

        let Some(callback) = callback else {
            debug!(form = %inner.id, "submit left to native handling");
            return SubmitOutcome::Native(value);
        };
        event.prevent_default();

        let input = value.clone();
        let result = match std::panic::catch_unwind(AssertUnwindSafe(move || callback(input))) {
            Ok(pending) => AssertUnwindSafe(pending).catch_unwind().await,
            Err(panic) => Err(panic),
        };
        match result {
            Ok(Ok(())) => {
                debug!(form = %inner.id, "form submitted");
                SubmitOutcome::Submitted(value)
            }
            Ok(Err(err)) => {
                warn!(form = %inner.id, error = %err, "submit callback failed");
                self.submission_failed()
            }
            Err(_) => {
                warn!(form = %inner.id, "submit callback panicked");
                self.submission_failed()
            }
        }
    }

    fn submission_failed(&self) -> SubmitOutcome {
        let issue = Issue::form_level(SUBMISSION_FAILED_MESSAGE);
        if let Some(on_error) = &self.inner.callbacks.on_error {
            on_error(std::slice::from_ref(&issue));
        }
        SubmitOutcome::Failed(issue)
    }
}

impl std::fmt::Debug for FormContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = &*self.inner;
        f.debug_struct("FormContext")
            .field("id", &inner.id)
            .field("schema", &inner.schema)
            .field("state", &inner.state)
            .field("errors", &inner.errors)
            .field("touched_fields", &inner.touched_fields)
            .field("dirty_fields", &inner.dirty_fields)
            .field("mode", &inner.mode)
            .field("validate_on", &inner.validate_on)
            .field("last_reset_state", &*lock(&inner.last_reset_state))
            .field("last_reset_errors", &*lock(&inner.last_reset_errors))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::json_schema::JsonSchema;
    use crate::schema::{FnSchema, Schema};
    use crate::test_utils::test_helpers::{ErrorRecorder, number, object, string};

    fn person_schema() -> JsonSchema {
        JsonSchema::new(object(&[("name", string(1)), ("age", number(18, 150))])).unwrap()
    }

    fn person_form(state: Value) -> FormContext {
        FormContext::new(FormOptions::new(person_schema()).initial_state(state))
    }

    #[test]
    fn defaults() {
        let form = FormContext::new(FormOptions::new(person_schema()));
        assert!(form.id().starts_with("form-"));
        assert_eq!(form.state().get(), json!({}));
        assert_eq!(form.mode(), ValidationMode::Eager);
        assert_eq!(form.validate_on(), &Trigger::defaults());
        assert!(form.is_valid());
        assert!(!form.is_touched());
        assert!(!form.is_dirty());
        assert!(!form.is_validating());
        assert!(!form.is_submitting());
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = FormContext::new(FormOptions::new(person_schema()));
        let b = FormContext::new(FormOptions::new(person_schema()));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn config_applies_present_fields() {
        let config = FormConfig {
            id: Some("configured".into()),
            mode: Some(ValidationMode::Lazy),
            initial_state: Some(json!({"name": "Ada"})),
            ..FormConfig::default()
        };
        let form = FormContext::new(FormOptions::new(person_schema()).config(config));
        assert_eq!(form.id(), "configured");
        assert_eq!(form.mode(), ValidationMode::Lazy);
        assert_eq!(form.validate_on(), &Trigger::defaults());
        assert_eq!(form.state().get(), json!({"name": "Ada"}));
    }

    #[test]
    fn live_state_does_not_alias_initial_state() {
        let form = person_form(json!({"name": "Ada", "age": 30}));
        form.set_value("name", json!("Grace"));
        assert_eq!(form.initial_state(), &json!({"name": "Ada", "age": 30}));
        form.set_errors(vec![Issue::new("taken", ["name"])]);
        assert!(form.initial_errors().is_empty());
    }

    #[tokio::test]
    async fn validate_replaces_errors_and_reports() {
        let recorder = ErrorRecorder::default();
        let form = FormContext::new(
            FormOptions::new(person_schema())
                .initial_state(json!({"name": "", "age": 15}))
                .initial_errors(vec![Issue::without_path("stale")])
                .on_error(recorder.callback()),
        );
        let outcome = form.validate().await;
        assert_eq!(outcome.issues().map(<[Issue]>::len), Some(2));
        assert_eq!(form.errors().get().len(), 2);
        assert_eq!(recorder.calls().len(), 1);
        assert!(!form.is_validating());

        form.set_value("name", json!("Ada"));
        form.set_value("age", json!(30));
        let outcome = form.validate().await;
        assert_eq!(outcome, ValidationOutcome::Value(json!({"name": "Ada", "age": 30})));
        assert!(form.is_valid());
        assert_eq!(recorder.calls().len(), 1);
    }

    #[tokio::test]
    async fn on_validate_false_is_form_level_failure() {
        let recorder = ErrorRecorder::default();
        let form = FormContext::new(
            FormOptions::new(person_schema())
                .initial_state(json!({"name": "Ada", "age": 30}))
                .on_validate(|_| async { false })
                .on_error(recorder.callback()),
        );
        let outcome = form.validate().await;
        let expected = vec![Issue::form_level(VALIDATION_FAILED_MESSAGE)];
        assert_eq!(outcome, ValidationOutcome::Issues(expected.clone()));
        assert_eq!(form.errors().get(), expected);
        assert_eq!(recorder.calls(), vec![expected]);
    }

    #[tokio::test]
    async fn on_validate_issues_replace_errors() {
        let form = FormContext::new(
            FormOptions::new(person_schema())
                .initial_state(json!({"name": "Ada", "age": 30}))
                .on_validate(|value: Value| async move {
                    if value["name"] == "Ada" {
                        vec![Issue::new("Name is taken", ["name"])]
                    } else {
                        vec![]
                    }
                }),
        );
        form.validate().await;
        assert_eq!(form.get_field_errors("name")[0].message, "Name is taken");

        form.set_value("name", json!("Grace"));
        assert!(form.validate().await.is_valid());
        assert!(form.is_valid());
    }

    #[tokio::test]
    async fn validate_field_only_touches_its_path() {
        let form = person_form(json!({"name": "", "age": 15}));
        form.set_errors(vec![
            Issue::new("old age", ["age"]),
            Issue::new("server says no", ["name"]),
        ]);
        let outcome = form.validate_field("age").await;
        let issues = outcome.issues().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path_string().as_deref(), Some("age"));

        let errors = form.errors().get();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "server says no");
        assert_eq!(errors[1].message, "Must be greater than or equal to 18");
    }

    #[tokio::test]
    async fn validate_field_value_sources() {
        let form = person_form(json!({"name": "", "age": 30}));
        assert_eq!(
            form.validate_field("age").await,
            ValidationOutcome::Value(json!(30))
        );
        assert_eq!(
            form.validate_field("missing").await,
            ValidationOutcome::Value(Value::Null)
        );
        form.set_value("name", json!("Ada"));
        assert_eq!(
            form.validate_field("name").await,
            ValidationOutcome::Value(json!("Ada"))
        );
        assert!(form.is_valid());
    }

    #[tokio::test]
    async fn validate_field_reads_parsed_output_on_success() {
        let schema = JsonSchema::new(json!({
            "type": "object",
            "properties": {"role": {"type": "string", "default": "member"}}
        }))
        .unwrap();
        let form = FormContext::new(FormOptions::new(schema));
        assert_eq!(
            form.validate_field("role").await,
            ValidationOutcome::Value(json!("member"))
        );
        assert_eq!(form.state().get(), json!({}));
    }

    #[tokio::test]
    async fn set_state_merges_top_level_and_marks_paths() {
        let form = person_form(json!({"name": "Ada", "age": 30, "address": {"city": "X", "zip": "1"}}));
        form.set_state(json!({"address": {"city": "Y"}}), false).await;
        assert_eq!(
            form.state().get(),
            json!({"name": "Ada", "age": 30, "address": {"city": "Y"}})
        );
        let expected: BTreeSet<String> = ["address", "address.city"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(form.dirty_fields().get(), expected);
        assert_eq!(form.touched_fields().get(), expected);
        assert!(form.is_valid());
    }

    #[tokio::test]
    async fn set_state_validates_changed_paths_only() {
        let form = person_form(json!({"name": "", "age": 30}));
        form.set_state(json!({"age": 10}), true).await;
        let errors = form.errors().get();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path_string().as_deref(), Some("age"));

        form.set_state(json!({"age": 20}), true).await;
        assert!(form.is_valid());
    }

    #[tokio::test]
    async fn set_state_ignores_non_objects() {
        let form = person_form(json!({"name": "Ada"}));
        form.set_state(json!([1, 2]), true).await;
        assert_eq!(form.state().get(), json!({"name": "Ada"}));
        assert!(!form.is_dirty());
    }

    #[tokio::test]
    async fn reset_to_initial() {
        let resets = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resets);
        let form = FormContext::new(
            FormOptions::new(person_schema())
                .initial_state(json!({"name": "Ada", "age": 30}))
                .initial_errors(vec![Issue::without_path("initial")])
                .on_reset(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
        );
        form.set_state(json!({"name": ""}), true).await;
        form.reset(None, None, false).await;
        assert_eq!(form.state().get(), json!({"name": "Ada", "age": 30}));
        assert_eq!(form.errors().get(), vec![Issue::without_path("initial")]);
        assert!(!form.is_touched());
        assert!(!form.is_dirty());
        assert_eq!(resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn custom_reset_moves_the_dirty_baseline() {
        let form = person_form(json!({"name": "Ada", "age": 30}));
        form.reset(Some(json!({"name": "Grace", "age": 40})), None, false)
            .await;
        form.dirty_field("name");
        assert!(!form.is_dirty());
        form.set_value("name", json!("Ada"));
        form.dirty_field("name");
        assert!(form.dirty_fields().with(|d| d.contains("name")));

        form.reset(None, None, false).await;
        form.dirty_field("name");
        assert!(!form.is_dirty());
    }

    #[tokio::test]
    async fn reset_awaits_requested_validation() {
        let form = person_form(json!({"name": "", "age": 30}));
        form.reset(None, Some(vec![]), true).await;
        assert!(!form.is_validating());
        assert_eq!(form.get_field_errors("name").len(), 1);
    }

    #[test]
    fn dirty_field_recomputes() {
        let form = person_form(json!({"age": 25}));
        form.set_value("age", json!(30));
        form.dirty_field("age");
        assert!(form.dirty_fields().with(|d| d.contains("age")));
        form.set_value("age", json!(25));
        form.dirty_field("age");
        assert!(!form.dirty_fields().with(|d| d.contains("age")));
    }

    #[test]
    fn touch_and_dirty_all_fields() {
        let form = person_form(json!({"name": "Ada", "tags": ["a"]}));
        form.touch_field("stale");
        form.touch_all_fields();
        form.dirty_all_fields();
        let expected: BTreeSet<String> = ["name", "tags", "tags[0]"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(form.touched_fields().get(), expected);
        assert_eq!(form.dirty_fields().get(), expected);
    }

    #[test]
    fn error_list_helpers() {
        let form = person_form(json!({}));
        form.set_errors(vec![Issue::new("a", ["name"])]);
        form.set_errors(vec![Issue::new("a", ["name"]), Issue::without_path("b")]);
        assert_eq!(form.errors().get().len(), 3);
        assert_eq!(form.get_field_errors("name").len(), 2);
        assert!(form.get_field_errors("age").is_empty());
        form.clear_errors();
        assert!(form.is_valid());
    }

    #[tokio::test]
    async fn submit_valid_with_callback() {
        let form = person_form(json!({"name": "Ada", "age": 30}));
        let mut event = FormEvent::default();
        let (tx, rx) = oneshot::channel();
        let outcome = form
            .submit_with(&mut event, move |value| async move {
                tx.send(value).ok();
                Ok::<(), SubmitError>(())
            })
            .await;
        assert_eq!(
            outcome,
            SubmitOutcome::Submitted(json!({"name": "Ada", "age": 30}))
        );
        assert_eq!(rx.await.unwrap(), json!({"name": "Ada", "age": 30}));
        assert!(event.is_default_prevented());
        assert!(!form.is_submitting());
        assert!(form.touched_fields().with(|t| t.contains("name")));
        assert!(form.dirty_fields().with(|d| d.contains("age")));
    }

    #[tokio::test]
    async fn submit_without_callback_is_native() {
        let form = person_form(json!({"name": "Ada", "age": 30}));
        let mut event = FormEvent::default();
        let outcome = form.submit(&mut event).await;
        assert!(matches!(outcome, SubmitOutcome::Native(_)));
        assert!(!event.is_default_prevented());
    }

    #[tokio::test]
    async fn submit_invalid_skips_callback_and_reports_once() {
        let recorder = ErrorRecorder::default();
        let called = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&called);
        let form = FormContext::new(
            FormOptions::new(person_schema())
                .initial_state(json!({"name": "", "age": 30}))
                .on_error(recorder.callback())
                .on_submit(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<(), SubmitError>(()) }
                }),
        );
        let mut event = FormEvent::default();
        let outcome = form.submit(&mut event).await;
        assert!(matches!(outcome, SubmitOutcome::Invalid(ref issues) if issues.len() == 1));
        assert_eq!(called.load(Ordering::SeqCst), 0);
        assert!(event.is_default_prevented());
        assert!(!form.is_valid());
        assert_eq!(recorder.calls().len(), 1);
        assert!(!form.is_submitting());
    }

    #[tokio::test]
    async fn submit_callback_error_becomes_form_level_issue() {
        let recorder = ErrorRecorder::default();
        let form = FormContext::new(
            FormOptions::new(person_schema())
                .initial_state(json!({"name": "Ada", "age": 30}))
                .on_error(recorder.callback()),
        );
        let mut event = FormEvent::default();
        let outcome = form
            .submit_with(&mut event, |_| async { Err::<(), SubmitError>("offline".into()) })
            .await;
        let expected = Issue::form_level(SUBMISSION_FAILED_MESSAGE);
        assert_eq!(outcome, SubmitOutcome::Failed(expected.clone()));
        assert_eq!(recorder.calls(), vec![vec![expected]]);
        assert!(event.is_default_prevented());
        assert!(!form.is_submitting());
    }

    #[tokio::test]
    async fn submit_callback_panic_is_contained() {
        let form = person_form(json!({"name": "Ada", "age": 30}));
        let explode = true;
        let mut event = FormEvent::default();
        let outcome = form
            .submit_with(&mut event, move |_| async move {
                if explode {
                    panic!("callback bug");
                }
                Ok::<(), SubmitError>(())
            })
            .await;
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        assert!(!form.is_submitting());
    }

    #[test]
    fn set_value_refuses_unwritable_paths() {
        let form = FormContext::new(
            FormOptions::new(person_schema()).initial_state(json!({"items": [], "tags": ["a"]})),
        );
        assert!(!form.set_value("items[18446744073709551615]", json!(1)));
        assert!(!form.set_value("items[1000000000000]", json!(1)));
        assert!(!form.set_value("tags.label", json!("x")));
        assert_eq!(form.state().get(), json!({"items": [], "tags": ["a"]}));

        assert!(form.set_value("items[2]", json!(1)));
        assert_eq!(form.state().get()["items"], json!([null, null, 1]));
    }

    struct Gated {
        gate: tokio::sync::Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait::async_trait]
    impl Schema for Gated {
        async fn validate(&self, input: &Value) -> ValidationOutcome {
            let rx = self.gate.lock().await.take();
            if let Some(rx) = rx {
                rx.await.ok();
            }
            ValidationOutcome::Value(input.clone())
        }
    }

    #[tokio::test]
    async fn is_validating_spans_overlapping_validations() {
        let (tx, rx) = oneshot::channel();
        let form = FormContext::new(FormOptions::new(SchemaSource::new(Gated {
            gate: tokio::sync::Mutex::new(Some(rx)),
        })));
        let slow = tokio::spawn({
            let form = form.clone();
            async move { form.validate().await }
        });
        let mut validations = form.validations().subscribe();
        validations.wait_for(|count| *count == 1).await.unwrap();
        assert!(form.is_validating());

        assert!(form.validate().await.is_valid());
        assert!(form.is_validating());

        tx.send(()).unwrap();
        assert!(slow.await.unwrap().is_valid());
        assert!(!form.is_validating());
    }

    #[tokio::test]
    async fn fn_schema_forms() {
        let form = FormContext::new(
            FormOptions::new(FnSchema::new(|input: &Value| {
                if input.get("accepted") == Some(&Value::Bool(true)) {
                    ValidationOutcome::Value(input.clone())
                } else {
                    ValidationOutcome::Issues(vec![Issue::new("Must accept", ["accepted"])])
                }
            }))
            .initial_state(json!({"accepted": false})),
        );
        assert!(!form.validate().await.is_valid());
        form.set_state(json!({"accepted": true}), true).await;
        assert!(form.is_valid());
    }
}
