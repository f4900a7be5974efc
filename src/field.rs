//! Field controllers.
//!
//! A [`FieldController`] is the logic of a single form input, without any rendering: it reads
//! the field's value, errors, and interaction flags from the form, and turns host events into
//! touch, dirty, and validation calls according to the form's mode and triggers.

use serde_json::Value;

use crate::config::{Trigger, ValidationMode};
use crate::error::FormError;
use crate::form::FormContext;
use crate::issue::ValidationOutcome;
use crate::path::get_property;
use crate::registry::{Scope, with_context, with_current_form};

/// Binds one path of a form to an input.
#[derive(Debug, Clone)]
pub struct FieldController {
    form: FormContext,
    name: String,
}

impl FieldController {
    /// A controller for the field at `name`.
    pub fn new(form: FormContext, name: impl Into<String>) -> Self {
        FieldController {
            form,
            name: name.into(),
        }
    }

    /// A controller for `name` within the form `form_id` provided to `scope`.
    pub fn attach(scope: &Scope, form_id: &str, name: impl Into<String>) -> Result<Self, FormError> {
        Ok(Self::new(with_context(scope, form_id)?, name))
    }

    /// A controller for `name` within the nearest form hosted by `scope` or an ancestor.
    pub fn attach_current(scope: &Scope, name: impl Into<String>) -> Result<Self, FormError> {
        Ok(Self::new(with_current_form(scope)?, name))
    }

    /// The field path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The form this field belongs to.
    pub fn form(&self) -> &FormContext {
        &self.form
    }

    /// The current value, `null` when absent.
    pub fn value(&self) -> Value {
        self.form
            .state()
            .with(|state| get_property(state, &self.name).cloned().unwrap_or_default())
    }

    /// The messages of every error attributed to this field.
    pub fn errors(&self) -> Vec<String> {
        self.form
            .get_field_errors(&self.name)
            .into_iter()
            .map(|issue| issue.message)
            .collect()
    }

    /// The first error message, if any.
    pub fn message(&self) -> Option<String> {
        self.errors().into_iter().next()
    }

    /// Whether the field has been touched.
    pub fn is_touched(&self) -> bool {
        self.form.touched_fields().with(|fields| fields.contains(&self.name))
    }

    /// Whether the field differs from its baseline.
    pub fn is_dirty(&self) -> bool {
        self.form.dirty_fields().with(|fields| fields.contains(&self.name))
    }

    /// Whether no error is attributed to the field.
    pub fn is_valid(&self) -> bool {
        self.form.get_field_errors(&self.name).is_empty()
    }

    /// Validates this field now.
    pub async fn validate(&self) -> ValidationOutcome {
        self.form.validate_field(&self.name).await
    }

    /// Writes a new value and handles it as input.
    pub async fn set_value(&self, value: Value) -> Option<ValidationOutcome> {
        self.form.set_value(&self.name, value);
        self.on_input().await
    }

    /// The field lost focus: it becomes touched.
    pub async fn on_blur(&self) -> Option<ValidationOutcome> {
        self.form.touch_field(&self.name);
        self.handle(Trigger::Blur).await
    }

    /// The value changed on a keystroke: dirtiness is recomputed.
    pub async fn on_input(&self) -> Option<ValidationOutcome> {
        self.form.dirty_field(&self.name);
        self.handle(Trigger::Input).await
    }

    /// The value was committed: dirtiness is recomputed.
    pub async fn on_change(&self) -> Option<ValidationOutcome> {
        self.form.dirty_field(&self.name);
        self.handle(Trigger::Change).await
    }

    /// The field gained focus.
    pub async fn on_focus(&self) -> Option<ValidationOutcome> {
        self.handle(Trigger::Focus).await
    }

    /// The field was mounted.
    pub async fn on_mount(&self) -> Option<ValidationOutcome> {
        self.handle(Trigger::Mount).await
    }

    /// Whether `trigger` runs validation for this form.
    ///
    /// Lazy forms validate fields on blur only; submission validates everything regardless.
    pub fn validates_on(&self, trigger: Trigger) -> bool {
        self.form.validate_on().contains(&trigger)
            && (self.form.mode() == ValidationMode::Eager || trigger == Trigger::Blur)
    }

    async fn handle(&self, trigger: Trigger) -> Option<ValidationOutcome> {
        if self.validates_on(trigger) {
            Some(self.validate().await)
        } else {
            None
        }
    }
}
