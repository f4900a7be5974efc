//! Array field controllers.
//!
//! [`ArrayField`] manipulates the array stored at one path of a form's state: listing its
//! items and appending, inserting, replacing, or removing them.  A missing (or `null`) array is
//! treated as empty and created by the first insertion.

use serde_json::Value;

use crate::error::FormError;
use crate::form::FormContext;
use crate::path::get_property;

/// One item of an array field.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    /// A stable identifier for rendering; the index.
    pub key: usize,
    /// The position of the item.
    pub index: usize,
    /// The item's current value.
    pub value: Value,
    /// True for the first item.
    pub first: bool,
    /// True for the last item.
    pub last: bool,
}

/// Binds the array at one path of a form.
#[derive(Debug, Clone)]
pub struct ArrayField {
    form: FormContext,
    name: String,
}

impl ArrayField {
    /// A controller for the array at `name`.
    pub fn new(form: FormContext, name: impl Into<String>) -> Self {
        ArrayField {
            form,
            name: name.into(),
        }
    }

    /// The array path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path of the item at `index`, e.g. `users[2]`.
    pub fn item_path(&self, index: usize) -> String {
        format!("{}[{}]", self.name, index)
    }

    /// The items of the array; empty when the path holds no array.
    pub fn fields(&self) -> Vec<ArrayItem> {
        let items = self.current().unwrap_or_default();
        let len = items.len();
        items
            .into_iter()
            .enumerate()
            .map(|(index, value)| ArrayItem {
                key: index,
                index,
                value,
                first: index == 0,
                last: index + 1 == len,
            })
            .collect()
    }

    /// Adds `value` at the end.
    pub fn append(&self, value: Value) -> Result<(), FormError> {
        self.mutate(|items| {
            items.push(value);
            Ok(())
        })
    }

    /// Alias for [`ArrayField::append`].
    pub fn push(&self, value: Value) -> Result<(), FormError> {
        self.append(value)
    }

    /// Adds `value` at the beginning.
    pub fn prepend(&self, value: Value) -> Result<(), FormError> {
        self.insert(0, value)
    }

    /// Inserts `value` at `index`, shifting later items; `index` may equal the length.
    pub fn insert(&self, index: usize, value: Value) -> Result<(), FormError> {
        self.mutate(|items| {
            if index > items.len() {
                return Err(self.out_of_bounds(index, items.len()));
            }
            items.insert(index, value);
            Ok(())
        })
    }

    /// Removes the item at `index`.
    pub fn remove(&self, index: usize) -> Result<Value, FormError> {
        self.mutate(|items| {
            if index >= items.len() {
                return Err(self.out_of_bounds(index, items.len()));
            }
            Ok(items.remove(index))
        })
    }

    /// Replaces the item at `index`.
    pub fn update(&self, index: usize, value: Value) -> Result<(), FormError> {
        self.mutate(|items| match items.get_mut(index) {
            Some(item) => {
                *item = value;
                Ok(())
            }
            None => Err(self.out_of_bounds(index, items.len())),
        })
    }

    fn out_of_bounds(&self, index: usize, len: usize) -> FormError {
        FormError::IndexOutOfBounds {
            path: self.name.clone(),
            index,
            len,
        }
    }

    fn current(&self) -> Result<Vec<Value>, FormError> {
        match self
            .form
            .state()
            .with(|state| get_property(state, &self.name).cloned())
        {
            Some(Value::Array(items)) => Ok(items),
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(_) => Err(FormError::NotAnArray {
                path: self.name.clone(),
            }),
        }
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Vec<Value>) -> Result<R, FormError>,
    ) -> Result<R, FormError> {
        let mut items = self.current()?;
        let result = f(&mut items)?;
        if !self.form.set_value(&self.name, Value::Array(items)) {
            return Err(FormError::UnwritablePath {
                path: self.name.clone(),
            });
        }
        self.form.touch_field(&self.name);
        self.form.dirty_field(&self.name);
        Ok(result)
    }
}
