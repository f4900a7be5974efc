//! # JSON Schema Validation
//!
//! [`JsonSchema`] is a ready-made [`Schema`] backed by a JSON Schema document.  Unlike a
//! pass/fail checker it walks the whole state tree and reports every problem it finds, each
//! with the path of the offending value, which is what field-level error display needs.
//!
//! ## Supported Keywords
//!
//! - `type`: null, boolean, integer, number, string, array, object (absent means any)
//! - `nullable`: accept `null` in addition to the declared type
//! - `enum`, `oneOf`
//! - `properties`, `required`, `default`
//! - `items` (one schema for every item, or an array of schemas for tuples)
//! - `minItems`, `maxItems`, `minLength`, `maxLength`, `pattern`, `minimum`, `maximum`
//! - `errorMessage`: replaces the message of any issue raised at that node
//!
//! On success the parsed output is the input with `default` values filled in for absent
//! properties.
//!
//! ```rust
//! use formstate::JsonSchema;
//! use serde_json::json;
//!
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
//! let outcome = schema.check(&json!({"name": "", "age": 15}));
//! let mut paths: Vec<String> = outcome
//!     .issues()
//!     .unwrap()
//!     .iter()
//!     .filter_map(|issue| issue.path_string())
//!     .collect();
//! paths.sort();
//! assert_eq!(paths, vec!["age", "name"]);
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::error::FormError;
use crate::issue::{Issue, ValidationOutcome};
use crate::path::PathSegment;
use crate::schema::Schema;

/// Key naming the value type.
pub const TYPE_KEY: &str = "type";
/// Key holding object property schemas.
pub const PROPERTIES_KEY: &str = "properties";
/// Key listing required property names.
pub const REQUIRED_KEY: &str = "required";
/// Key holding the item schema (or tuple of schemas).
pub const ITEMS_KEY: &str = "items";
/// Key listing allowed values.
pub const ENUM_KEY: &str = "enum";
/// Key listing alternative schemas.
pub const ONE_OF_KEY: &str = "oneOf";
/// Key holding the value used for an absent property.
pub const DEFAULT_KEY: &str = "default";
/// Key allowing `null` besides the declared type.
pub const NULLABLE_KEY: &str = "nullable";
/// Minimum string length, in characters.
pub const MIN_LENGTH_KEY: &str = "minLength";
/// Maximum string length, in characters.
pub const MAX_LENGTH_KEY: &str = "maxLength";
/// Regular expression strings must match.
pub const PATTERN_KEY: &str = "pattern";
/// Inclusive numeric lower bound.
pub const MINIMUM_KEY: &str = "minimum";
/// Inclusive numeric upper bound.
pub const MAXIMUM_KEY: &str = "maximum";
/// Minimum array length.
pub const MIN_ITEMS_KEY: &str = "minItems";
/// Maximum array length.
pub const MAX_ITEMS_KEY: &str = "maxItems";
/// Message replacing every message raised at a node.
pub const ERROR_MESSAGE_KEY: &str = "errorMessage";

/// The null type.
pub const TYPE_NULL: &str = "null";
/// The boolean type.
pub const TYPE_BOOLEAN: &str = "boolean";
/// The integer type.
pub const TYPE_INTEGER: &str = "integer";
/// The number type.
pub const TYPE_NUMBER: &str = "number";
/// The string type.
pub const TYPE_STRING: &str = "string";
/// The array type.
pub const TYPE_ARRAY: &str = "array";
/// The object type.
pub const TYPE_OBJECT: &str = "object";

const KNOWN_TYPES: &[&str] = &[
    TYPE_NULL,
    TYPE_BOOLEAN,
    TYPE_INTEGER,
    TYPE_NUMBER,
    TYPE_STRING,
    TYPE_ARRAY,
    TYPE_OBJECT,
];

/////////////////////////////////////////////// JsonSchema ///////////////////////////////////////////////

/// A [`Schema`] defined by a JSON Schema document.
#[derive(Debug, Clone)]
pub struct JsonSchema {
    schema: Value,
    patterns: HashMap<String, Regex>,
}

impl JsonSchema {
    /// Checks `schema` for structural correctness and compiles its patterns.
    ///
    /// # Returns
    /// * `Ok(JsonSchema)` - The document is usable
    /// * `Err(FormError::InvalidSchema)` - The document is malformed, with its location
    pub fn new(schema: Value) -> Result<Self, FormError> {
        let mut patterns = HashMap::new();
        check_schema(&schema, "#", &mut patterns)?;
        Ok(JsonSchema { schema, patterns })
    }

    /// Builds the schema of a type implementing [`FormSchema`].
    pub fn of<T: FormSchema>() -> Result<Self, FormError> {
        Self::new(T::form_schema())
    }

    /// Returns the underlying schema document.
    pub fn as_value(&self) -> &Value {
        &self.schema
    }

    /// Validates `value` synchronously.
    pub fn check(&self, value: &Value) -> ValidationOutcome {
        let mut validator = Validator {
            patterns: &self.patterns,
            issues: Vec::new(),
        };
        let mut path = Vec::new();
        let output = validator.node(value, &self.schema, &mut path);
        if validator.issues.is_empty() {
            ValidationOutcome::Value(output)
        } else {
            ValidationOutcome::Issues(validator.issues)
        }
    }
}

#[async_trait]
impl Schema for JsonSchema {
    async fn validate(&self, input: &Value) -> ValidationOutcome {
        self.check(input)
    }
}

/////////////////////////////////////////////// Schema checks ///////////////////////////////////////////////

fn invalid(at: &str, what: &str) -> FormError {
    FormError::InvalidSchema(format!("{}: {}", at, what))
}

fn check_schema(
    schema: &Value,
    at: &str,
    patterns: &mut HashMap<String, Regex>,
) -> Result<(), FormError> {
    let obj = schema
        .as_object()
        .ok_or_else(|| invalid(at, "schema must be an object"))?;

    if let Some(ty) = obj.get(TYPE_KEY) {
        let ty = ty
            .as_str()
            .ok_or_else(|| invalid(at, "type must be a string"))?;
        if !KNOWN_TYPES.contains(&ty) {
            return Err(invalid(at, &format!("unknown schema type: {}", ty)));
        }
    }

    if let Some(one_of) = obj.get(ONE_OF_KEY) {
        let variants = one_of
            .as_array()
            .ok_or_else(|| invalid(at, "oneOf must be an array"))?;
        for (index, variant) in variants.iter().enumerate() {
            check_schema(variant, &format!("{}/oneOf/{}", at, index), patterns)?;
        }
    }

    if let Some(properties) = obj.get(PROPERTIES_KEY) {
        let properties = properties
            .as_object()
            .ok_or_else(|| invalid(at, "properties must be an object"))?;
        for (name, property) in properties {
            check_schema(property, &format!("{}/properties/{}", at, name), patterns)?;
        }
    }

    match obj.get(ITEMS_KEY) {
        Some(Value::Array(tuple)) => {
            for (index, item) in tuple.iter().enumerate() {
                check_schema(item, &format!("{}/items/{}", at, index), patterns)?;
            }
        }
        Some(item) => check_schema(item, &format!("{}/items", at), patterns)?,
        None => {}
    }

    if let Some(required) = obj.get(REQUIRED_KEY) {
        let required = required
            .as_array()
            .ok_or_else(|| invalid(at, "required must be an array"))?;
        if !required.iter().all(Value::is_string) {
            return Err(invalid(at, "required property names must be strings"));
        }
    }

    if let Some(allowed) = obj.get(ENUM_KEY) {
        if !allowed.is_array() {
            return Err(invalid(at, "enum must be an array"));
        }
    }

    for key in [MIN_LENGTH_KEY, MAX_LENGTH_KEY, MIN_ITEMS_KEY, MAX_ITEMS_KEY] {
        if let Some(bound) = obj.get(key) {
            if bound.as_u64().is_none() {
                return Err(invalid(at, &format!("{} must be a non-negative integer", key)));
            }
        }
    }

    for key in [MINIMUM_KEY, MAXIMUM_KEY] {
        if let Some(bound) = obj.get(key) {
            if !bound.is_number() {
                return Err(invalid(at, &format!("{} must be a number", key)));
            }
        }
    }

    if let Some(nullable) = obj.get(NULLABLE_KEY) {
        if !nullable.is_boolean() {
            return Err(invalid(at, "nullable must be a boolean"));
        }
    }

    if let Some(message) = obj.get(ERROR_MESSAGE_KEY) {
        if !message.is_string() {
            return Err(invalid(at, "errorMessage must be a string"));
        }
    }

    if let Some(pattern) = obj.get(PATTERN_KEY) {
        let pattern = pattern
            .as_str()
            .ok_or_else(|| invalid(at, "pattern must be a string"))?;
        if !patterns.contains_key(pattern) {
            let regex = Regex::new(pattern)
                .map_err(|e| invalid(at, &format!("invalid pattern: {}", e)))?;
            patterns.insert(pattern.to_string(), regex);
        }
    }

    Ok(())
}

/////////////////////////////////////////////// Validation ///////////////////////////////////////////////

/// Returns the JSON type name of a value.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => TYPE_NULL,
        Value::Bool(_) => TYPE_BOOLEAN,
        Value::Number(n) if n.is_i64() || n.is_u64() => TYPE_INTEGER,
        Value::Number(_) => TYPE_NUMBER,
        Value::String(_) => TYPE_STRING,
        Value::Array(_) => TYPE_ARRAY,
        Value::Object(_) => TYPE_OBJECT,
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        TYPE_NULL => value.is_null(),
        TYPE_BOOLEAN => value.is_boolean(),
        TYPE_INTEGER => value.is_i64() || value.is_u64(),
        TYPE_NUMBER => value.is_number(),
        TYPE_STRING => value.is_string(),
        TYPE_ARRAY => value.is_array(),
        TYPE_OBJECT => value.is_object(),
        _ => false,
    }
}

struct Validator<'a> {
    patterns: &'a HashMap<String, Regex>,
    issues: Vec<Issue>,
}

impl Validator<'_> {
    fn report(&mut self, path: &[PathSegment], custom: Option<&str>, message: String) {
        let message = custom.map(str::to_string).unwrap_or(message);
        self.issues.push(Issue::new(message, path.iter().cloned()));
    }

    fn node(&mut self, value: &Value, schema: &Value, path: &mut Vec<PathSegment>) -> Value {
        match schema.as_object() {
            Some(schema) => self.validate_node(value, schema, path),
            None => value.clone(),
        }
    }

    fn validate_node(
        &mut self,
        value: &Value,
        schema: &Map<String, Value>,
        path: &mut Vec<PathSegment>,
    ) -> Value {
        let custom = schema.get(ERROR_MESSAGE_KEY).and_then(Value::as_str);

        if value.is_null() && schema.get(NULLABLE_KEY) == Some(&Value::Bool(true)) {
            return Value::Null;
        }

        if let Some(variants) = schema.get(ONE_OF_KEY).and_then(Value::as_array) {
            for variant in variants {
                let mut attempt = Validator {
                    patterns: self.patterns,
                    issues: Vec::new(),
                };
                let output = attempt.node(value, variant, path);
                if attempt.issues.is_empty() {
                    return output;
                }
            }
            self.report(
                path,
                custom,
                "Does not match any allowed variant".to_string(),
            );
            return value.clone();
        }

        if let Some(allowed) = schema.get(ENUM_KEY).and_then(Value::as_array) {
            if !allowed.contains(value) {
                let allowed: Vec<String> = allowed.iter().map(Value::to_string).collect();
                self.report(
                    path,
                    custom,
                    format!("Expected one of {}", allowed.join(", ")),
                );
                return value.clone();
            }
        }

        if let Some(expected) = schema.get(TYPE_KEY).and_then(Value::as_str) {
            if !type_matches(expected, value) {
                self.report(
                    path,
                    custom,
                    format!("Expected {}, received {}", expected, value_type_name(value)),
                );
                return value.clone();
            }
        }

        match value {
            Value::String(s) => {
                self.check_string(s, schema, path, custom);
                value.clone()
            }
            Value::Number(_) => {
                self.check_number(value, schema, path, custom);
                value.clone()
            }
            Value::Array(items) => self.check_array(items, schema, path, custom),
            Value::Object(object) => self.check_object(object, schema, path, custom),
            _ => value.clone(),
        }
    }

    fn check_string(
        &mut self,
        s: &str,
        schema: &Map<String, Value>,
        path: &[PathSegment],
        custom: Option<&str>,
    ) {
        let len = s.chars().count() as u64;
        if let Some(min) = schema.get(MIN_LENGTH_KEY).and_then(Value::as_u64) {
            if len < min {
                self.report(path, custom, format!("Must be at least {} characters", min));
            }
        }
        if let Some(max) = schema.get(MAX_LENGTH_KEY).and_then(Value::as_u64) {
            if len > max {
                self.report(path, custom, format!("Must be at most {} characters", max));
            }
        }
        if let Some(pattern) = schema.get(PATTERN_KEY).and_then(Value::as_str) {
            if let Some(regex) = self.patterns.get(pattern) {
                if !regex.is_match(s) {
                    self.report(path, custom, format!("Does not match pattern {}", pattern));
                }
            }
        }
    }

    fn check_number(
        &mut self,
        value: &Value,
        schema: &Map<String, Value>,
        path: &[PathSegment],
        custom: Option<&str>,
    ) {
        let Some(n) = value.as_f64() else {
            return;
        };
        if let Some(min) = schema.get(MINIMUM_KEY) {
            if min.as_f64().is_some_and(|bound| n < bound) {
                self.report(
                    path,
                    custom,
                    format!("Must be greater than or equal to {}", min),
                );
            }
        }
        if let Some(max) = schema.get(MAXIMUM_KEY) {
            if max.as_f64().is_some_and(|bound| n > bound) {
                self.report(path, custom, format!("Must be less than or equal to {}", max));
            }
        }
    }

    fn check_array(
        &mut self,
        items: &[Value],
        schema: &Map<String, Value>,
        path: &mut Vec<PathSegment>,
        custom: Option<&str>,
    ) -> Value {
        let len = items.len() as u64;
        if let Some(min) = schema.get(MIN_ITEMS_KEY).and_then(Value::as_u64) {
            if len < min {
                self.report(path, custom, format!("Must contain at least {} items", min));
            }
        }
        if let Some(max) = schema.get(MAX_ITEMS_KEY).and_then(Value::as_u64) {
            if len > max {
                self.report(path, custom, format!("Must contain at most {} items", max));
            }
        }

        let mut output = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let item_schema = match schema.get(ITEMS_KEY) {
                Some(Value::Array(tuple)) => tuple.get(index),
                other => other,
            };
            path.push(PathSegment::Index(index));
            output.push(match item_schema {
                Some(item_schema) => self.node(item, item_schema, path),
                None => item.clone(),
            });
            path.pop();
        }
        Value::Array(output)
    }

    fn check_object(
        &mut self,
        object: &Map<String, Value>,
        schema: &Map<String, Value>,
        path: &mut Vec<PathSegment>,
        custom: Option<&str>,
    ) -> Value {
        let mut output = object.clone();
        let properties = schema.get(PROPERTIES_KEY).and_then(Value::as_object);

        if let Some(properties) = properties {
            for (name, property) in properties {
                path.push(PathSegment::Key(name.clone()));
                if let Some(child) = object.get(name) {
                    let parsed = self.node(child, property, path);
                    output.insert(name.clone(), parsed);
                } else if let Some(default) = property.get(DEFAULT_KEY) {
                    output.insert(name.clone(), default.clone());
                }
                path.pop();
            }
        }

        if let Some(required) = schema.get(REQUIRED_KEY).and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if output.contains_key(name) {
                    continue;
                }
                let property_message = properties
                    .and_then(|p| p.get(name))
                    .and_then(|p| p.get(ERROR_MESSAGE_KEY))
                    .and_then(Value::as_str);
                path.push(PathSegment::Key(name.to_string()));
                self.report(path, property_message.or(custom), "Required".to_string());
                path.pop();
            }
        }

        Value::Object(output)
    }
}

/////////////////////////////////////////////// FormSchema ///////////////////////////////////////////////

/// Types that describe their own form schema.
///
/// Implemented for the primitive types here and derived for structs and unit enums with
/// `#[derive(FormSchema)]`.
pub trait FormSchema {
    /// Whether a property of this type may be absent from its parent object.
    const OPTIONAL: bool = false;

    /// Returns the JSON schema document for this type.
    fn form_schema() -> Value;
}

macro_rules! integer_form_schema {
    ($($ty:ty),*) => {
        $(impl FormSchema for $ty {
            fn form_schema() -> Value {
                json!({ TYPE_KEY: TYPE_INTEGER })
            }
        })*
    };
}

integer_form_schema!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FormSchema for f32 {
    fn form_schema() -> Value {
        json!({ TYPE_KEY: TYPE_NUMBER })
    }
}

impl FormSchema for f64 {
    fn form_schema() -> Value {
        json!({ TYPE_KEY: TYPE_NUMBER })
    }
}

impl FormSchema for bool {
    fn form_schema() -> Value {
        json!({ TYPE_KEY: TYPE_BOOLEAN })
    }
}

impl FormSchema for String {
    fn form_schema() -> Value {
        json!({ TYPE_KEY: TYPE_STRING })
    }
}

impl FormSchema for Value {
    fn form_schema() -> Value {
        json!({})
    }
}

impl<T: FormSchema> FormSchema for Option<T> {
    const OPTIONAL: bool = true;

    fn form_schema() -> Value {
        let mut schema = T::form_schema();
        if let Some(obj) = schema.as_object_mut() {
            obj.insert(NULLABLE_KEY.to_string(), Value::Bool(true));
        }
        schema
    }
}

impl<T: FormSchema> FormSchema for Vec<T> {
    fn form_schema() -> Value {
        json!({ TYPE_KEY: TYPE_ARRAY, ITEMS_KEY: T::form_schema() })
    }
}
